//! Decoder for XGBoost's JSON model schema, shared by the JSON and UBJSON
//! encodings.
//!
//! Only the fields needed for inference are read; statistics such as
//! `loss_changes` and `sum_hessian` are ignored.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

use super::objective::Objective;
use super::tree::{RegTree, TreeNode};
use super::ubjson;
use super::{Booster, ModelFormat};

#[derive(Debug, Deserialize)]
struct ModelDocument {
    learner: Learner,
    #[serde(default)]
    version: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: Value,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveDoc,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    num_feature: String,
    #[serde(default)]
    num_target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDoc {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GbTreeDoc {
    model: GbTreeModel,
}

#[derive(Debug, Deserialize)]
struct DartDoc {
    gbtree: GbTreeDoc,
    weight_drop: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    gbtree_model_param: GbTreeModelParam,
    trees: Vec<TreeDoc>,
    #[serde(default)]
    tree_info: Vec<i64>,
    #[serde(default)]
    iteration_indptr: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModelParam {
    num_trees: String,
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeDoc {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<i64>,
    tree_param: TreeParam,
}

#[derive(Debug, Deserialize)]
struct TreeParam {
    num_nodes: String,
    #[serde(default)]
    size_leaf_vector: Option<String>,
}

/// `default_left` is written as 0/1 integers by most releases and as booleans
/// by a few.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedModel {
        message: message.into(),
    }
}

fn parse_param<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| malformed(format!("cannot parse {field} value {value:?}")))
}

/// Parse `base_score`, which newer releases write as a bracketed vector
/// (`"[5E-1]"`) and older ones as a bare number (`"5E-1"`).
pub(super) fn parse_base_score(raw: &str) -> Result<f32> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = inner.split(',').next().unwrap_or_default();
    parse_param("base_score", first)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Booster> {
    let doc: ModelDocument = serde_json::from_slice(bytes)?;
    decode_document(doc, ModelFormat::Json)
}

pub(super) fn decode_ubjson(bytes: &[u8]) -> Result<Booster> {
    let doc: ModelDocument = serde_json::from_value(ubjson::parse(bytes)?)?;
    decode_document(doc, ModelFormat::Ubjson)
}

fn decode_document(doc: ModelDocument, format: ModelFormat) -> Result<Booster> {
    let learner = doc.learner;
    let params = &learner.learner_model_param;

    let num_feature: usize = parse_param("num_feature", &params.num_feature)?;
    let num_class: usize = match &params.num_class {
        Some(raw) => parse_param("num_class", raw)?,
        None => 0,
    };
    let num_target: usize = match &params.num_target {
        Some(raw) => parse_param("num_target", raw)?,
        None => 1,
    };
    let num_groups = num_class.max(num_target).max(1);

    let objective = Objective::from_name(&learner.objective.name)?;
    let base_score = parse_base_score(&params.base_score)?;
    let base_margin = objective.base_margin(base_score)?;

    let booster_name = learner
        .gradient_booster
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let (model, weights) = match booster_name.as_str() {
        "gbtree" => {
            let doc: GbTreeDoc = serde_json::from_value(learner.gradient_booster)?;
            (doc.model, None)
        }
        "dart" => {
            let doc: DartDoc = serde_json::from_value(learner.gradient_booster)?;
            (doc.gbtree.model, Some(doc.weight_drop))
        }
        _ => {
            return Err(Error::UnsupportedBooster {
                name: booster_name,
            })
        }
    };

    let num_trees: usize = parse_param("num_trees", &model.gbtree_model_param.num_trees)?;
    if num_trees != model.trees.len() {
        return Err(malformed(format!(
            "num_trees is {num_trees} but {} trees are present",
            model.trees.len()
        )));
    }

    let mut trees = Vec::with_capacity(num_trees);
    for (index, tree) in model.trees.iter().enumerate() {
        trees.push(decode_tree(tree, num_feature, index)?);
    }

    let tree_groups = if model.tree_info.is_empty() {
        vec![0; num_trees]
    } else {
        if model.tree_info.len() != num_trees {
            return Err(malformed("tree_info length does not match num_trees"));
        }
        model
            .tree_info
            .iter()
            .map(|&g| {
                usize::try_from(g)
                    .ok()
                    .filter(|g| *g < num_groups)
                    .ok_or_else(|| malformed(format!("tree assigned to invalid output group {g}")))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let tree_weights = match weights {
        Some(w) if w.len() == num_trees => w,
        Some(w) => {
            return Err(malformed(format!(
                "dart weight_drop has {} entries for {num_trees} trees",
                w.len()
            )))
        }
        None => vec![1.0; num_trees],
    };

    let iteration_indptr = match model.iteration_indptr {
        Some(indptr) if !indptr.is_empty() => indptr,
        _ => {
            let parallel: usize = match &model.gbtree_model_param.num_parallel_tree {
                Some(raw) => parse_param("num_parallel_tree", raw)?,
                None => 1,
            };
            uniform_indptr(num_trees, parallel.max(1) * num_groups)?
        }
    };

    let version = match doc.version.as_slice() {
        [major, minor, patch, ..] => Some([*major, *minor, *patch]),
        _ => None,
    };

    Booster::assemble(super::BoosterParts {
        format,
        booster_name,
        objective,
        base_score,
        base_margin,
        trees,
        tree_groups,
        tree_weights,
        iteration_indptr,
        num_groups,
        num_feature,
        feature_names: learner.feature_names,
        version,
    })
}

/// Iteration boundaries for models that store the same number of trees per
/// boosting round.
pub(super) fn uniform_indptr(num_trees: usize, per_iteration: usize) -> Result<Vec<usize>> {
    if num_trees % per_iteration != 0 {
        return Err(malformed(format!(
            "{num_trees} trees do not divide into rounds of {per_iteration}"
        )));
    }
    Ok((0..=num_trees / per_iteration)
        .map(|i| i * per_iteration)
        .collect())
}

fn decode_tree(doc: &TreeDoc, num_feature: usize, index: usize) -> Result<RegTree> {
    let num_nodes: usize = parse_param("num_nodes", &doc.tree_param.num_nodes)?;
    if let Some(raw) = &doc.tree_param.size_leaf_vector {
        let size: usize = parse_param("size_leaf_vector", raw)?;
        if size > 1 {
            return Err(Error::UnsupportedSplit {
                tree: index,
                node: 0,
                detail: format!("vector leaves of size {size}"),
            });
        }
    }

    let lengths = [
        doc.left_children.len(),
        doc.right_children.len(),
        doc.split_indices.len(),
        doc.split_conditions.len(),
        doc.default_left.len(),
    ];
    if lengths.iter().any(|&len| len != num_nodes) {
        return Err(malformed(format!(
            "tree {index} declares {num_nodes} nodes but arrays have lengths {lengths:?}"
        )));
    }

    let mut nodes = Vec::with_capacity(num_nodes);
    for node in 0..num_nodes {
        if doc.split_type.get(node).copied().unwrap_or(0) != 0 {
            return Err(Error::UnsupportedSplit {
                tree: index,
                node,
                detail: "categorical split".to_string(),
            });
        }

        let left = doc.left_children[node];
        if left == -1 {
            nodes.push(TreeNode::Leaf {
                value: doc.split_conditions[node],
            });
            continue;
        }

        let child = |raw: i64| {
            usize::try_from(raw)
                .map_err(|_| malformed(format!("tree {index} node {node} has child {raw}")))
        };
        let feature = usize::try_from(doc.split_indices[node]).map_err(|_| {
            malformed(format!(
                "tree {index} node {node} has split index {}",
                doc.split_indices[node]
            ))
        })?;
        nodes.push(TreeNode::Split {
            feature,
            threshold: doc.split_conditions[node],
            left: child(left)?,
            right: child(doc.right_children[node])?,
            default_left: doc.default_left[node].is_set(),
        });
    }

    RegTree::new(nodes, num_feature, index)
}
