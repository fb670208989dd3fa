//! Fitness-weighted preferential attachment with a force-directed layout.
//!
//! Both growth and layout are pure steps: they take a network by reference
//! and return the next one.

use crate::config::NetworkConfig;
use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Distribution, Uniform, weighted::WeightedIndex};
use serde::{Deserialize, Serialize};

/// Scale of the random offset of a new node around the origin.
const SPAWN_RADIUS: f64 = 10.0;

/// Separation assumed for coincident nodes.
const MIN_DISTANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub fitness: f64,
    pub degree: usize,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: usize,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Network {
    pub fn degrees(&self) -> Vec<usize> {
        self.nodes.iter().map(|node| node.degree).collect()
    }
}

fn spawn_node<R: Rng + ?Sized>(rng: &mut R, pos_dist: &Uniform<f64>) -> Node {
    Node {
        // Open interval so that every node can attract links.
        fitness: rng.sample(rand::distr::Open01),
        degree: 0,
        x: pos_dist.sample(rng),
        y: pos_dist.sample(rng),
        vx: 0.0,
        vy: 0.0,
    }
}

/// Two linked nodes near the origin.
pub fn seed_network<R: Rng + ?Sized>(rng: &mut R) -> Result<Network> {
    let pos_dist = Uniform::new(-SPAWN_RADIUS, SPAWN_RADIUS)?;
    let mut nodes = vec![spawn_node(rng, &pos_dist), spawn_node(rng, &pos_dist)];
    nodes[0].degree = 1;
    nodes[1].degree = 1;
    Ok(Network {
        nodes,
        links: vec![Link {
            source: 1,
            target: 0,
        }],
    })
}

/// Add one node that links to distinct existing nodes chosen with
/// probability proportional to fitness times degree.
pub fn grow_network<R: Rng + ?Sized>(
    net: &Network,
    cfg: &NetworkConfig,
    rng: &mut R,
) -> Result<Network> {
    let pos_dist = Uniform::new(-SPAWN_RADIUS, SPAWN_RADIUS)?;
    let n_old = net.nodes.len();
    let n_links = cfg.links_per_node.min(n_old);

    let mut weights: Vec<f64> = net
        .nodes
        .iter()
        .map(|node| node.fitness * node.degree as f64)
        .collect();
    if weights.iter().all(|&w| w == 0.0) {
        weights = net.nodes.iter().map(|node| node.fitness).collect();
    }

    let mut next = net.clone();
    let i_new = n_old;
    next.nodes.push(spawn_node(rng, &pos_dist));

    for _ in 0..n_links {
        let target_dist =
            WeightedIndex::new(&weights).context("failed to construct attachment weights")?;
        let i_target = target_dist.sample(rng);
        // Exclude the target from further draws of this node.
        weights[i_target] = 0.0;

        next.links.push(Link {
            source: i_new,
            target: i_target,
        });
        next.nodes[i_target].degree += 1;
        next.nodes[i_new].degree += 1;
    }

    Ok(next)
}

/// One explicit Euler step of the force-directed layout.
pub fn layout_step(net: &Network, cfg: &NetworkConfig) -> Network {
    let n_nodes = net.nodes.len();
    let mut force = vec![(0.0, 0.0); n_nodes];

    for i in 0..n_nodes {
        for j in (i + 1)..n_nodes {
            let (dx, dy, dist) = separation(&net.nodes[i], &net.nodes[j]);
            let push = cfg.repulsion / (dist * dist);
            let (fx, fy) = (push * dx / dist, push * dy / dist);
            force[i].0 += fx;
            force[i].1 += fy;
            force[j].0 -= fx;
            force[j].1 -= fy;
        }
    }

    for link in &net.links {
        let (i, j) = (link.source, link.target);
        let (dx, dy, dist) = separation(&net.nodes[i], &net.nodes[j]);
        let pull = cfg.spring_strength * (dist - cfg.spring_length);
        let (fx, fy) = (pull * dx / dist, pull * dy / dist);
        force[i].0 -= fx;
        force[i].1 -= fy;
        force[j].0 += fx;
        force[j].1 += fy;
    }

    let nodes = net
        .nodes
        .iter()
        .zip(force)
        .map(|(node, (fx, fy))| {
            let fx = fx - cfg.gravity * node.x;
            let fy = fy - cfg.gravity * node.y;
            let vx = (node.vx + fx * cfg.time_step) * cfg.damping;
            let vy = (node.vy + fy * cfg.time_step) * cfg.damping;
            Node {
                x: node.x + vx * cfg.time_step,
                y: node.y + vy * cfg.time_step,
                vx,
                vy,
                ..node.clone()
            }
        })
        .collect();

    Network {
        nodes,
        links: net.links.clone(),
    }
}

/// Offset from `b` to `a` and its length, with coincident nodes nudged
/// apart along the x axis.
fn separation(a: &Node, b: &Node) -> (f64, f64, f64) {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist < MIN_DISTANCE {
        (MIN_DISTANCE, 0.0, MIN_DISTANCE)
    } else {
        (dx, dy, dist)
    }
}

/// Grow a network to `cfg.n_nodes` nodes and relax its layout.
pub fn run_network<R: Rng + ?Sized>(cfg: &NetworkConfig, rng: &mut R) -> Result<Network> {
    let mut net = seed_network(rng).context("failed to seed network")?;
    while net.nodes.len() < cfg.n_nodes {
        net = grow_network(&net, cfg, rng).context("failed to grow network")?;
    }
    for i_step in 0..cfg.layout_steps {
        net = layout_step(&net, cfg);
        if (i_step + 1) % 50 == 0 {
            log::debug!("completed {} layout steps", i_step + 1);
        }
    }

    let max_degree = net.degrees().into_iter().max().unwrap_or(0);
    log::info!(
        "grew {} nodes and {} links, max degree {max_degree}",
        net.nodes.len(),
        net.links.len()
    );
    Ok(net)
}
