//! Tag trees (ISO/IEC 15444-1 B.10.2).
//!
//! A tag tree encodes a 2-D array of non-negative integers so that
//! information common to neighbourhoods (the minimum) is coded once. Each
//! node carries a running lower bound and a "value known" flag; decoding a
//! leaf walks root to leaf, raising bounds monotonically, reading one bit
//! per undecided step. Nodes live in flat per-level arrays, leaf level
//! first.

use crate::error::Result;

#[derive(Clone, Copy, Default)]
struct Node {
    value: u32,
    known: bool,
}

#[derive(Clone)]
struct Level {
    width: u32,
    nodes: Vec<Node>,
}

#[derive(Clone)]
pub struct TagTree {
    /// Index 0 is the leaf level; the last level is the 1x1 root.
    levels: Vec<Level>,
}

impl TagTree {
    pub fn new(width: u32, height: u32) -> Self {
        let mut levels = Vec::new();
        let (mut w, mut h) = (width.max(1), height.max(1));
        loop {
            levels.push(Level { width: w, nodes: vec![Node::default(); (w * h) as usize] });
            if w == 1 && h == 1 {
                break;
            }
            w = w.div_ceil(2);
            h = h.div_ceil(2);
        }
        Self { levels }
    }

    /// Decode the value of leaf (x, y) up to `threshold`.
    ///
    /// Returns the leaf value if it resolved below the threshold, or the
    /// current lower bound (>= threshold) if the coded value is not yet
    /// determined at this threshold. `read_bit` supplies packet-header
    /// bits.
    pub fn read(
        &mut self,
        x: u32,
        y: u32,
        threshold: u32,
        read_bit: &mut impl FnMut() -> Result<u32>,
    ) -> Result<u32> {
        let mut low = 0u32;
        for level_index in (0..self.levels.len()).rev() {
            let level = &mut self.levels[level_index];
            let node_index = ((y >> level_index) * level.width + (x >> level_index)) as usize;
            let node = &mut level.nodes[node_index];
            if node.value < low {
                node.value = low;
            }
            while !node.known && node.value < threshold {
                if read_bit()? == 1 {
                    node.known = true;
                } else {
                    node.value += 1;
                }
            }
            low = node.value;
            if !node.known {
                // Cannot be resolved below the threshold.
                return Ok(node.value);
            }
        }
        Ok(low)
    }
}
