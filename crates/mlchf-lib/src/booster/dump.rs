//! Reader for XGBoost's plain-text model dump.
//!
//! ```text
//! booster[0]:
//! 0:[f0<0.5] yes=1,no=2,missing=1,gain=12.5,cover=100
//! 	1:leaf=-1,cover=60
//! 	2:leaf=0.5,cover=40
//! ```
//!
//! Dumps carry no learner parameters, so the objective, base score and
//! feature count come from [`DumpOptions`].

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::objective::Objective;
use super::tree::{RegTree, TreeNode};
use super::{json, Booster, BoosterParts, DumpOptions, ModelFormat};

fn malformed(line: usize, message: impl std::fmt::Display) -> Error {
    Error::MalformedModel {
        message: format!("dump line {line}: {message}"),
    }
}

/// Cheap sniff used by format detection.
pub(super) fn looks_like_dump(text: &str) -> bool {
    text.trim_start().starts_with("booster[")
}

struct FeatureResolver<'a> {
    names: HashMap<&'a str, usize>,
}

impl<'a> FeatureResolver<'a> {
    fn new(names: &'a [String]) -> Self {
        Self {
            names: names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.as_str(), i))
                .collect(),
        }
    }

    fn resolve(&self, token: &str) -> Option<usize> {
        if let Some(&index) = self.names.get(token) {
            return Some(index);
        }
        token.strip_prefix('f')?.parse().ok()
    }
}

pub(super) fn decode(text: &str, options: &DumpOptions) -> Result<Booster> {
    let resolver = FeatureResolver::new(&options.feature_names);

    let mut raw_trees: Vec<Vec<(usize, TreeNode)>> = Vec::new();
    for (offset, line) in text.lines().enumerate() {
        let line_no = offset + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("booster[") {
            raw_trees.push(Vec::new());
            continue;
        }
        let tree = raw_trees.len().saturating_sub(1);
        let current = raw_trees
            .last_mut()
            .ok_or_else(|| malformed(line_no, "node before first booster header"))?;
        current.push(parse_node(line, line_no, tree, &resolver)?);
    }

    let max_feature = raw_trees
        .iter()
        .flatten()
        .filter_map(|(_, node)| match node {
            TreeNode::Split { feature, .. } => Some(*feature),
            TreeNode::Leaf { .. } => None,
        })
        .max();
    let inferred = max_feature.map_or(0, |f| f + 1);
    let num_feature = options
        .num_feature
        .or_else(|| (!options.feature_names.is_empty()).then_some(options.feature_names.len()))
        .unwrap_or(inferred);

    let mut trees = Vec::with_capacity(raw_trees.len());
    for (index, raw) in raw_trees.into_iter().enumerate() {
        trees.push(assemble_tree(raw, num_feature, index)?);
    }

    let objective = Objective::from_name(&options.objective)?;
    let base_margin = objective.base_margin(options.base_score)?;
    let num_trees = trees.len();

    Booster::assemble(BoosterParts {
        format: ModelFormat::TextDump,
        booster_name: "gbtree".to_string(),
        objective,
        base_score: options.base_score,
        base_margin,
        trees,
        tree_groups: vec![0; num_trees],
        tree_weights: vec![1.0; num_trees],
        iteration_indptr: json::uniform_indptr(num_trees, 1)?,
        num_groups: 1,
        num_feature,
        feature_names: options.feature_names.clone(),
        version: None,
    })
}

fn parse_node(
    line: &str,
    line_no: usize,
    tree: usize,
    resolver: &FeatureResolver<'_>,
) -> Result<(usize, TreeNode)> {
    let (id, body) = line
        .split_once(':')
        .ok_or_else(|| malformed(line_no, "expected `<id>:`"))?;
    let id: usize = id
        .trim()
        .parse()
        .map_err(|_| malformed(line_no, format!("bad node id {id:?}")))?;

    if let Some(rest) = body.strip_prefix("leaf=") {
        let value = rest.split(',').next().unwrap_or_default();
        let value: f32 = value
            .parse()
            .map_err(|_| malformed(line_no, format!("bad leaf value {value:?}")))?;
        return Ok((id, TreeNode::Leaf { value }));
    }

    let condition = body
        .strip_prefix('[')
        .and_then(|b| b.split_once(']'))
        .ok_or_else(|| malformed(line_no, "expected `[feature<threshold]`"))?;
    let (test, attrs) = condition;

    if test.contains(":{") || !test.contains('<') {
        return Err(Error::UnsupportedSplit {
            tree,
            node: id,
            detail: format!("dump condition {test:?} on line {line_no}"),
        });
    }
    let split_at = test.rfind('<').unwrap_or_default();
    let (feature_token, threshold) = (&test[..split_at], &test[split_at + 1..]);
    let feature = resolver
        .resolve(feature_token)
        .ok_or_else(|| malformed(line_no, format!("unknown feature {feature_token:?}")))?;
    let threshold: f32 = threshold
        .parse()
        .map_err(|_| malformed(line_no, format!("bad threshold {threshold:?}")))?;

    let mut yes = None;
    let mut no = None;
    let mut missing = None;
    for pair in attrs.trim().split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let slot = match key.trim() {
            "yes" => &mut yes,
            "no" => &mut no,
            "missing" => &mut missing,
            _ => continue,
        };
        *slot = Some(
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| malformed(line_no, format!("bad {key} target {value:?}")))?,
        );
    }

    let (Some(left), Some(right)) = (yes, no) else {
        return Err(malformed(line_no, "split is missing yes=/no= targets"));
    };
    let default_left = missing.map_or(true, |m| m == left);

    Ok((
        id,
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            default_left,
        },
    ))
}

fn assemble_tree(raw: Vec<(usize, TreeNode)>, num_feature: usize, index: usize) -> Result<RegTree> {
    let mut slots: Vec<Option<TreeNode>> = vec![None; raw.len()];
    for (id, node) in raw {
        let slot = slots.get_mut(id).ok_or_else(|| Error::MalformedModel {
            message: format!("tree {index} node id {id} exceeds its node count"),
        })?;
        if slot.replace(node).is_some() {
            return Err(Error::MalformedModel {
                message: format!("tree {index} repeats node id {id}"),
            });
        }
    }
    // Every slot is filled: ids are unique and bounded by the node count.
    let nodes = slots.into_iter().flatten().collect();
    RegTree::new(nodes, num_feature, index)
}
