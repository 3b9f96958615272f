//! Unpacking trees into the index: the one-way, two-way, and three-way
//! reconciliation used to seed the index from commits (checkout, reset) and,
//! with three trees, to stage a merge's conflicts.
//!
//! This is deliberately independent of any line-level content merge: it only
//! ever compares OIDs and modes per path, producing stage-0 entries for
//! matches and stage-1/2/3 entries when a path's three sides disagree. A
//! caller that wants file-content merging runs that separately over the
//! stage-1/2/3 entries this leaves behind.

use std::collections::BTreeMap;

use bstr::BString;
use git_hash::ObjectId;
use git_object::{FileMode, Object, Tree};
use git_odb::ObjectDatabase;

use crate::entry::{EntryFlags, IndexEntry, StatData};
use crate::{Index, IndexError, Stage};

/// Which sides are present for a one/two/three-way unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackFn {
    /// Seed the index from a single tree (checkout of a commit).
    OneWay,
    /// Reconcile two trees (e.g. `read-tree -m A B`).
    TwoWay,
    /// Reconcile three trees: base, ours, theirs (merge).
    ThreeWay,
}

/// Options controlling how `unpack_trees` resolves each path.
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Which of the supplied trees unpacking is relative to.
    pub fn_: UnpackFn,
    /// Merge mode: collapse identical sides into a single stage-0 entry
    /// rather than always recording every side (set by merge driver callers;
    /// `false` is a plain multi-tree read with no reconciliation).
    pub merge: bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            fn_: UnpackFn::OneWay,
            merge: true,
        }
    }
}

/// A single file's identity: OID + mode, or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Side(Option<(ObjectId, FileMode)>);

/// Replace the contents of `index` with the result of reconciling `trees`.
///
/// `trees` must have exactly one, two, or three elements matching `options.fn_`.
/// On a three-way unpack with `options.merge` set, paths where all three
/// sides agree (or where orig == one side and the other differs, the
/// fast-forward case) collapse to a stage-0 entry; paths that disagree in
/// a way that isn't a clean fast-forward are written as stage 1/2/3 entries
/// for a later content-merge pass to resolve.
pub fn unpack_trees(
    index: &mut Index,
    odb: &ObjectDatabase,
    trees: &[ObjectId],
    options: &UnpackOptions,
) -> Result<(), IndexError> {
    let expected = match options.fn_ {
        UnpackFn::OneWay => 1,
        UnpackFn::TwoWay => 2,
        UnpackFn::ThreeWay => 3,
    };
    if trees.len() != expected {
        return Err(IndexError::InvalidEntry {
            offset: 0,
            reason: format!(
                "unpack_trees expected {expected} tree(s) for {:?}, got {}",
                options.fn_,
                trees.len()
            ),
        });
    }

    let flat_maps: Vec<BTreeMap<BString, (ObjectId, FileMode)>> = trees
        .iter()
        .map(|oid| flatten_tree(odb, oid))
        .collect::<Result<_, _>>()?;

    let mut all_paths: Vec<BString> = flat_maps.iter().flat_map(|m| m.keys().cloned()).collect();
    all_paths.sort();
    all_paths.dedup();

    *index = Index::new();

    for path in all_paths {
        let sides: Vec<Side> = flat_maps
            .iter()
            .map(|m| Side(m.get(&path).copied()))
            .collect();

        match options.fn_ {
            UnpackFn::OneWay => {
                if let Some((oid, mode)) = sides[0].0 {
                    index.add(make_entry(path, oid, mode, Stage::Normal));
                }
            }
            UnpackFn::TwoWay => unpack_two_way(index, &path, sides[0], sides[1]),
            UnpackFn::ThreeWay => {
                unpack_three_way(index, &path, sides[0], sides[1], sides[2], options.merge)
            }
        }
    }

    Ok(())
}

fn unpack_two_way(index: &mut Index, path: &BString, old: Side, new: Side) {
    match new.0 {
        Some((oid, mode)) => index.add(make_entry(path.clone(), oid, mode, Stage::Normal)),
        None => {
            // Path existed before and is gone now: nothing to stage. `old`
            // is only consulted by callers that want to distinguish a
            // deletion from a path that never existed, which plain two-way
            // unpacking doesn't need to.
            let _ = old;
        }
    }
}

fn unpack_three_way(
    index: &mut Index,
    path: &BString,
    orig: Side,
    ours: Side,
    theirs: Side,
    merge: bool,
) {
    if !merge {
        if let Some((oid, mode)) = ours.0 {
            index.add(make_entry(path.clone(), oid, mode, Stage::Normal));
        }
        return;
    }

    if ours == theirs {
        // Both sides agree (including both-deleted): clean, whichever side
        // produced it.
        if let Some((oid, mode)) = ours.0 {
            index.add(make_entry(path.clone(), oid, mode, Stage::Normal));
        }
        return;
    }

    if ours == orig {
        // Only theirs changed: take theirs outright.
        if let Some((oid, mode)) = theirs.0 {
            index.add(make_entry(path.clone(), oid, mode, Stage::Normal));
        }
        return;
    }

    if theirs == orig {
        // Only ours changed: keep ours.
        if let Some((oid, mode)) = ours.0 {
            index.add(make_entry(path.clone(), oid, mode, Stage::Normal));
        }
        return;
    }

    // Both sides touched the path differently: stage the conflict for a
    // content-merge pass. Absent sides simply contribute no stage entry.
    if let Some((oid, mode)) = orig.0 {
        index.add(make_entry(path.clone(), oid, mode, Stage::Base));
    }
    if let Some((oid, mode)) = ours.0 {
        index.add(make_entry(path.clone(), oid, mode, Stage::Ours));
    }
    if let Some((oid, mode)) = theirs.0 {
        index.add(make_entry(path.clone(), oid, mode, Stage::Theirs));
    }
}

fn make_entry(path: BString, oid: ObjectId, mode: FileMode, stage: Stage) -> IndexEntry {
    IndexEntry {
        path,
        oid,
        mode,
        stage,
        stat: StatData::default(),
        flags: EntryFlags::default(),
    }
}

/// Flatten a tree (recursively) into path -> (oid, mode).
fn flatten_tree(
    odb: &ObjectDatabase,
    tree_oid: &ObjectId,
) -> Result<BTreeMap<BString, (ObjectId, FileMode)>, IndexError> {
    let mut map = BTreeMap::new();
    flatten_tree_into(odb, tree_oid, &BString::from(""), &mut map)?;
    Ok(map)
}

fn flatten_tree_into(
    odb: &ObjectDatabase,
    tree_oid: &ObjectId,
    prefix: &BString,
    map: &mut BTreeMap<BString, (ObjectId, FileMode)>,
) -> Result<(), IndexError> {
    let tree = read_tree(odb, tree_oid)?;
    for entry in &tree.entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            let mut p = prefix.clone();
            p.push(b'/');
            p.extend_from_slice(&entry.name);
            p
        };

        if entry.mode.is_tree() {
            flatten_tree_into(odb, &entry.oid, &path, map)?;
        } else {
            map.insert(path, (entry.oid, entry.mode));
        }
    }
    Ok(())
}

fn read_tree(odb: &ObjectDatabase, tree_oid: &ObjectId) -> Result<Tree, IndexError> {
    let obj = odb.read(tree_oid)?.ok_or_else(|| IndexError::InvalidEntry {
        offset: 0,
        reason: format!("tree object {tree_oid} not found"),
    })?;
    match obj {
        Object::Tree(t) => Ok(t),
        other => Err(IndexError::InvalidEntry {
            offset: 0,
            reason: format!("{tree_oid} is a {}, not a tree", other.object_type()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::{Blob, TreeEntry};

    fn write_blob(odb: &ObjectDatabase, data: &[u8]) -> ObjectId {
        odb.write_raw(git_object::ObjectType::Blob, data).unwrap()
    }

    fn write_tree(odb: &ObjectDatabase, entries: Vec<TreeEntry>) -> ObjectId {
        let mut tree = Tree::new();
        tree.entries = entries;
        tree.sort();
        odb.write_raw(git_object::ObjectType::Tree, &tree.serialize_content())
            .unwrap()
    }

    fn test_odb() -> (tempfile::TempDir, ObjectDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let odb = ObjectDatabase::open(dir.path()).unwrap();
        (dir, odb)
    }

    #[test]
    fn one_way_seeds_stage_zero() {
        let (_dir, odb) = test_odb();
        let blob = write_blob(&odb, b"hello");
        let tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "a.txt".into(),
                oid: blob,
            }],
        );

        let mut index = Index::new();
        unpack_trees(
            &mut index,
            &odb,
            &[tree],
            &UnpackOptions {
                fn_: UnpackFn::OneWay,
                merge: true,
            },
        )
        .unwrap();

        assert_eq!(index.len(), 1);
        let entry = index.get(bstr::BStr::new("a.txt"), Stage::Normal).unwrap();
        assert_eq!(entry.oid, blob);
    }

    #[test]
    fn three_way_clean_fast_forward_takes_theirs() {
        let (_dir, odb) = test_odb();
        let base_blob = write_blob(&odb, b"base");
        let their_blob = write_blob(&odb, b"theirs");

        let base_tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "f.txt".into(),
                oid: base_blob,
            }],
        );
        let their_tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "f.txt".into(),
                oid: their_blob,
            }],
        );

        let mut index = Index::new();
        unpack_trees(
            &mut index,
            &odb,
            &[base_tree, base_tree, their_tree],
            &UnpackOptions {
                fn_: UnpackFn::ThreeWay,
                merge: true,
            },
        )
        .unwrap();

        assert!(index.conflicts().is_empty());
        let entry = index.get(bstr::BStr::new("f.txt"), Stage::Normal).unwrap();
        assert_eq!(entry.oid, their_blob);
    }

    #[test]
    fn three_way_divergent_content_stages_conflict() {
        let (_dir, odb) = test_odb();
        let base_blob = write_blob(&odb, b"base");
        let our_blob = write_blob(&odb, b"ours");
        let their_blob = write_blob(&odb, b"theirs");

        let base_tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "f.txt".into(),
                oid: base_blob,
            }],
        );
        let our_tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "f.txt".into(),
                oid: our_blob,
            }],
        );
        let their_tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "f.txt".into(),
                oid: their_blob,
            }],
        );

        let mut index = Index::new();
        unpack_trees(
            &mut index,
            &odb,
            &[base_tree, our_tree, their_tree],
            &UnpackOptions {
                fn_: UnpackFn::ThreeWay,
                merge: true,
            },
        )
        .unwrap();

        let conflicts = index.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert!(index.get(bstr::BStr::new("f.txt"), Stage::Base).is_some());
        assert!(index.get(bstr::BStr::new("f.txt"), Stage::Ours).is_some());
        assert!(index.get(bstr::BStr::new("f.txt"), Stage::Theirs).is_some());
    }

    #[test]
    fn three_way_add_in_both_with_different_content_conflicts() {
        let (_dir, odb) = test_odb();
        let our_blob = write_blob(&odb, b"ours");
        let their_blob = write_blob(&odb, b"theirs");

        let empty_tree = write_tree(&odb, vec![]);
        let our_tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "new.txt".into(),
                oid: our_blob,
            }],
        );
        let their_tree = write_tree(
            &odb,
            vec![TreeEntry {
                mode: FileMode::Regular,
                name: "new.txt".into(),
                oid: their_blob,
            }],
        );

        let mut index = Index::new();
        unpack_trees(
            &mut index,
            &odb,
            &[empty_tree, our_tree, their_tree],
            &UnpackOptions {
                fn_: UnpackFn::ThreeWay,
                merge: true,
            },
        )
        .unwrap();

        assert_eq!(index.conflicts().len(), 1);
    }
}
