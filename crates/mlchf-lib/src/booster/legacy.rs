//! Decoder for the binary model format written by XGBoost 1.x and 2.0
//! `save_model` when the file name does not end in `.json`.
//!
//! The layout is a raw little-endian dump of the C++ parameter structs:
//!
//! ```text
//! ["binf"]                          optional prefix
//! learner param                     136 bytes (base_score, num_feature, num_class, ...)
//! objective name, booster name      u64 length + bytes each
//! gbtree param                      160 bytes (num_trees, num_parallel_tree, ...)
//! per tree: tree param (148 bytes), nodes (20 bytes each), stats (16 bytes each)
//! tree_info                         i32 per tree
//! dart only: weight_drop            u64 count + f32 per tree
//! ```
//!
//! Anything after the booster (attributes, eval metrics) is not needed for
//! prediction and is left unread.

use crate::error::{Error, Result};

use super::json::uniform_indptr;
use super::objective::Objective;
use super::tree::{RegTree, TreeNode};
use super::{Booster, BoosterParts, ModelFormat};

const LEARNER_PARAM_SIZE: usize = 136;
const GBTREE_PARAM_SIZE: usize = 160;
const TREE_PARAM_SIZE: usize = 148;
const NODE_SIZE: usize = 20;
const NODE_STAT_SIZE: usize = 16;

/// Longest objective or booster name accepted while sniffing the header.
const MAX_NAME_LEN: u64 = 64;

/// Low 31 bits of `sindex_` hold the split feature; the top bit is
/// `default_left`.
const SPLIT_INDEX_MASK: u32 = (1 << 31) - 1;
/// `sindex_` of a node removed by pruning.
const DELETED_NODE: u32 = u32::MAX;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len())?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    fn read<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Some(out)
    }

    fn i32(&mut self) -> Option<i32> {
        self.read().map(i32::from_le_bytes)
    }

    fn u32(&mut self) -> Option<u32> {
        self.read().map(u32::from_le_bytes)
    }

    fn f32(&mut self) -> Option<f32> {
        self.read().map(f32::from_le_bytes)
    }

    fn u64(&mut self) -> Option<u64> {
        self.read().map(u64::from_le_bytes)
    }

    /// A length-prefixed ASCII name, or `None` if it does not look like one.
    fn name(&mut self) -> Option<String> {
        let len = self.u64()?;
        if len == 0 || len > MAX_NAME_LEN {
            return None;
        }
        let raw = self.take(usize::try_from(len).ok()?)?;
        let valid = raw
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'-'));
        valid.then(|| String::from_utf8_lossy(raw).into_owned())
    }
}

/// Fields of the learner header used for prediction.
struct LearnerHeader {
    base_score: f32,
    num_feature: usize,
    num_class: usize,
    num_target: usize,
    version: Option<[u32; 3]>,
    objective: String,
    booster: String,
}

fn header(cursor: &mut Cursor<'_>) -> Option<LearnerHeader> {
    let param = cursor.take(LEARNER_PARAM_SIZE)?;
    let mut fields = Cursor {
        bytes: param,
        pos: 0,
    };
    let base_score = fields.f32()?;
    let num_feature = fields.u32()?;
    let num_class = fields.i32()?;
    let _contain_extra_attrs = fields.i32()?;
    let _contain_eval_metrics = fields.i32()?;
    let major = fields.u32()?;
    let minor = fields.u32()?;
    let num_target = fields.u32()?;

    let objective = cursor.name()?;
    let booster = cursor.name()?;
    Some(LearnerHeader {
        base_score,
        num_feature: usize::try_from(num_feature).ok()?,
        num_class: usize::try_from(num_class).ok()?,
        num_target: usize::try_from(num_target).ok()?.max(1),
        version: (major != 0).then_some([major, minor, 0]),
        objective,
        booster,
    })
}

fn truncated(what: &str) -> Error {
    Error::MalformedModel {
        message: format!("binary model ends inside {what}"),
    }
}

/// Decode a binary model.
///
/// Returns [`Error::UnsupportedModelFormat`] when the bytes do not start with
/// a plausible learner header, so unrelated files are not reported as broken
/// models.
pub(super) fn decode(bytes: &[u8]) -> Result<Booster> {
    let body = bytes.strip_prefix(b"binf").unwrap_or(bytes);
    let mut cursor = Cursor {
        bytes: body,
        pos: 0,
    };
    let header = header(&mut cursor).ok_or(Error::UnsupportedModelFormat { origin: None })?;

    let objective = Objective::from_name(&header.objective)?;
    let base_margin = objective.base_margin(header.base_score)?;
    let num_groups = header.num_class.max(header.num_target).max(1);

    let dart = match header.booster.as_str() {
        "gbtree" => false,
        "dart" => true,
        _ => {
            return Err(Error::UnsupportedBooster {
                name: header.booster,
            })
        }
    };

    let param = cursor
        .take(GBTREE_PARAM_SIZE)
        .ok_or_else(|| truncated("the gbtree parameters"))?;
    let mut fields = Cursor {
        bytes: param,
        pos: 0,
    };
    let num_trees = fields
        .i32()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| truncated("the gbtree parameters"))?;
    let num_parallel_tree = fields
        .i32()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(1)
        .max(1);

    // Each tree needs at least its parameter block and one node.
    let min_tree = TREE_PARAM_SIZE + NODE_SIZE + NODE_STAT_SIZE;
    if num_trees > body.len() / min_tree {
        return Err(Error::MalformedModel {
            message: format!("binary model declares {num_trees} trees but is too short"),
        });
    }

    let mut trees = Vec::with_capacity(num_trees);
    for index in 0..num_trees {
        trees.push(decode_tree(&mut cursor, header.num_feature, index)?);
    }

    let mut tree_groups = Vec::with_capacity(num_trees);
    for _ in 0..num_trees {
        let group = cursor.i32().ok_or_else(|| truncated("tree_info"))?;
        let group = usize::try_from(group)
            .ok()
            .filter(|g| *g < num_groups)
            .ok_or_else(|| Error::MalformedModel {
                message: format!("tree assigned to invalid output group {group}"),
            })?;
        tree_groups.push(group);
    }

    let tree_weights = if dart && num_trees > 0 {
        let count = cursor.u64().ok_or_else(|| truncated("weight_drop"))?;
        if count != num_trees as u64 {
            return Err(Error::MalformedModel {
                message: format!("dart weight_drop has {count} entries for {num_trees} trees"),
            });
        }
        (0..num_trees)
            .map(|_| cursor.f32().ok_or_else(|| truncated("weight_drop")))
            .collect::<Result<Vec<_>>>()?
    } else {
        vec![1.0; num_trees]
    };

    Booster::assemble(BoosterParts {
        format: ModelFormat::LegacyBinary,
        booster_name: header.booster,
        objective,
        base_score: header.base_score,
        base_margin,
        trees,
        tree_groups,
        tree_weights,
        iteration_indptr: uniform_indptr(num_trees, num_parallel_tree * num_groups)?,
        num_groups,
        num_feature: header.num_feature,
        feature_names: Vec::new(),
        version: header.version,
    })
}

/// `(cleft, cright, sindex, info)` of one packed node; the parent link is
/// not needed.
fn node_record(raw: &[u8]) -> Option<(i32, i32, u32, f32)> {
    let mut fields = Cursor { bytes: raw, pos: 0 };
    let _parent = fields.i32()?;
    Some((fields.i32()?, fields.i32()?, fields.u32()?, fields.f32()?))
}

fn decode_tree(cursor: &mut Cursor<'_>, num_feature: usize, index: usize) -> Result<RegTree> {
    let param = cursor
        .take(TREE_PARAM_SIZE)
        .ok_or_else(|| truncated("a tree header"))?;
    let mut fields = Cursor {
        bytes: param,
        pos: 0,
    };
    let _num_roots = fields.i32();
    let num_nodes = fields
        .i32()
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| Error::MalformedModel {
            message: format!("tree {index} has no nodes"),
        })?;
    let _num_deleted = fields.i32();
    let _max_depth = fields.i32();
    let _num_feature = fields.i32();
    let size_leaf_vector = fields.i32().unwrap_or(0);
    if size_leaf_vector > 1 {
        return Err(Error::UnsupportedSplit {
            tree: index,
            node: 0,
            detail: format!("vector leaves of size {size_leaf_vector}"),
        });
    }

    let raw_nodes = num_nodes
        .checked_mul(NODE_SIZE)
        .and_then(|len| cursor.take(len))
        .ok_or_else(|| truncated("tree nodes"))?;
    num_nodes
        .checked_mul(NODE_STAT_SIZE)
        .and_then(|len| cursor.take(len))
        .ok_or_else(|| truncated("tree statistics"))?;

    let mut nodes = Vec::with_capacity(num_nodes);
    for (node, raw) in raw_nodes.chunks_exact(NODE_SIZE).enumerate() {
        let (left, right, sindex, info) = node_record(raw).ok_or_else(|| truncated("tree nodes"))?;

        if sindex == DELETED_NODE {
            // Unreachable after pruning; kept to preserve node indices.
            nodes.push(TreeNode::Leaf { value: 0.0 });
            continue;
        }
        if left == -1 {
            nodes.push(TreeNode::Leaf { value: info });
            continue;
        }
        let child = |raw: i32| {
            usize::try_from(raw).map_err(|_| Error::MalformedModel {
                message: format!("tree {index} node {node} has child {raw}"),
            })
        };
        nodes.push(TreeNode::Split {
            feature: (sindex & SPLIT_INDEX_MASK) as usize,
            threshold: info,
            left: child(left)?,
            right: child(right)?,
            default_left: sindex >> 31 != 0,
        });
    }

    RegTree::new(nodes, num_feature, index)
}
