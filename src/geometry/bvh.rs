// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding Volume Hierarchy (BVH) for spatial acceleration
//! Used to find candidate segment pairs when sectioned hole outlines are
//! overlaid on the board boundary

use super::BoundingBox;

/// BVH node
#[derive(Debug, Clone)]
pub struct BvhNode {
    pub bbox: BoundingBox,
    pub left: Option<Box<BvhNode>>,
    pub right: Option<Box<BvhNode>>,
    /// Item indices (only for leaf nodes)
    pub items: Vec<usize>,
}

impl BvhNode {
    fn leaf(bbox: BoundingBox, items: Vec<usize>) -> Self {
        Self {
            bbox,
            left: None,
            right: None,
            items,
        }
    }

    fn internal(bbox: BoundingBox, left: Box<BvhNode>, right: Box<BvhNode>) -> Self {
        Self {
            bbox,
            left: Some(left),
            right: Some(right),
            items: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Bounding Volume Hierarchy over arbitrary boxed items
#[derive(Debug, Clone)]
pub struct Bvh {
    root: BvhNode,
}

impl Bvh {
    const MAX_DEPTH: usize = 32;
    const LEAF_SIZE: usize = 4;

    /// Build from `(item_index, bbox)` pairs
    pub fn build(items: Vec<(usize, BoundingBox)>) -> Self {
        if items.is_empty() {
            return Self {
                root: BvhNode::leaf(BoundingBox::empty(), Vec::new()),
            };
        }
        Self {
            root: Self::build_recursive(items, 0),
        }
    }

    fn build_recursive(mut items: Vec<(usize, BoundingBox)>, depth: usize) -> BvhNode {
        let bbox = Self::union_of(&items);

        if items.len() <= Self::LEAF_SIZE || depth >= Self::MAX_DEPTH {
            return BvhNode::leaf(bbox, items.iter().map(|(idx, _)| *idx).collect());
        }

        // Split at the median of the longest axis
        let size = bbox.size();
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };
        items.sort_by(|(_, a), (_, b)| a.center()[axis].total_cmp(&b.center()[axis]));

        let right_items = items.split_off(items.len() / 2);
        let left = Box::new(Self::build_recursive(items, depth + 1));
        let right = Box::new(Self::build_recursive(right_items, depth + 1));
        let bbox = left.bbox.union(&right.bbox);

        BvhNode::internal(bbox, left, right)
    }

    fn union_of(items: &[(usize, BoundingBox)]) -> BoundingBox {
        items
            .iter()
            .fold(BoundingBox::empty(), |acc, (_, bbox)| acc.union(bbox))
    }

    /// Items whose box intersects `bbox`
    pub fn query(&self, bbox: &BoundingBox) -> Vec<usize> {
        let mut result = Vec::new();
        Self::query_recursive(&self.root, bbox, &mut result);
        result
    }

    fn query_recursive(node: &BvhNode, bbox: &BoundingBox, result: &mut Vec<usize>) {
        if node.bbox.is_empty() || !node.bbox.intersects(bbox) {
            return;
        }

        if node.is_leaf() {
            result.extend_from_slice(&node.items);
            return;
        }
        if let Some(left) = node.left.as_deref() {
            Self::query_recursive(left, bbox, result);
        }
        if let Some(right) = node.right.as_deref() {
            Self::query_recursive(right, bbox, result);
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> &BvhNode {
        &self.root
    }
}
