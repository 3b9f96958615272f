//! Adapter that hands a single path's merge off to a user-supplied external
//! program instead of the built-in content merge.
//!
//! The child is invoked with the wire protocol described in the spec's
//! external merge-program interface: hex object IDs, the path, then octal
//! modes, in that fixed order. The child owns any index update it wants to
//! make — this adapter only runs it and reports its exit status.

use bstr::BStr;
use git_hash::ObjectId;
use git_object::FileMode;
use git_utils::subprocess::GitCommand;

use crate::MergeError;

/// Adapter that hands one path's merge off to a configured external
/// program, matching the fixed wire protocol below.
pub struct ExternalProgramCallback {
    program: String,
}

impl ExternalProgramCallback {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    /// Invoke the program over one path's three sides.
    ///
    /// Returns `Ok(true)` for a clean resolution (exit status 0), `Ok(false)`
    /// for a conflict (nonzero exit status reported by the merge tool itself).
    pub fn merge(
        &self,
        orig: Option<(ObjectId, FileMode)>,
        ours: Option<(ObjectId, FileMode)>,
        theirs: Option<(ObjectId, FileMode)>,
        path: &BStr,
    ) -> Result<bool, MergeError> {
        run_external_merge(&self.program, orig, ours, theirs, path)
    }
}

/// Invoke `program` over one path's three sides.
///
/// Returns `Ok(true)` for a clean resolution (exit status 0), `Ok(false)`
/// for a conflict (nonzero exit status reported by the merge tool itself).
pub fn run_external_merge(
    program: &str,
    orig: Option<(ObjectId, FileMode)>,
    ours: Option<(ObjectId, FileMode)>,
    theirs: Option<(ObjectId, FileMode)>,
    path: &BStr,
) -> Result<bool, MergeError> {
    let argv = [
        hex_or_empty(orig),
        hex_or_empty(ours),
        hex_or_empty(theirs),
        path.to_string(),
        mode_or_empty(orig),
        mode_or_empty(ours),
        mode_or_empty(theirs),
    ];

    let result = GitCommand::new(program)
        .args(&argv)
        .run()
        .map_err(|_| MergeError::ExternalProgramFailed {
            program: program.to_string(),
            status: -1,
        })?;

    Ok(result.success())
}

fn hex_or_empty(side: Option<(ObjectId, FileMode)>) -> String {
    side.map(|(oid, _)| oid.to_hex()).unwrap_or_default()
}

fn mode_or_empty(side: Option<(ObjectId, FileMode)>) -> String {
    side.map(|(_, mode)| format!("{:o}", mode.raw())).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sides_format_as_empty_strings() {
        assert_eq!(hex_or_empty(None), "");
        assert_eq!(mode_or_empty(None), "");
    }

    #[test]
    fn present_side_formats_hex_and_octal() {
        let oid = ObjectId::Sha1([0xab; 20]);
        let hex = hex_or_empty(Some((oid, FileMode::Regular)));
        assert_eq!(hex, oid.to_hex());
        assert_eq!(mode_or_empty(Some((oid, FileMode::Regular))), "100644");
        assert_eq!(mode_or_empty(Some((oid, FileMode::Executable))), "100755");
    }

    #[test]
    fn clean_exit_reports_success() {
        let ok = run_external_merge("true", None, None, None, BStr::new("f")).unwrap();
        assert!(ok);
    }

    #[test]
    fn nonzero_exit_reports_conflict() {
        let ok = run_external_merge("false", None, None, None, BStr::new("f")).unwrap();
        assert!(!ok);
    }

    #[test]
    fn callback_wraps_the_configured_program() {
        let cb = ExternalProgramCallback::new("true");
        assert!(cb.merge(None, None, None, BStr::new("f")).unwrap());
    }
}
