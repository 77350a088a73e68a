//! Graph file loaders
//!
//! Two text formats are accepted.
//!
//! Edge list:
//! ```text
//! # comments and blank lines are ignored
//! 4          vertex count
//! 3          edge count
//! 0 1 1.5    one "u v weight" line per edge
//! 1 2 2
//! 2 3 0.5
//! ```
//!
//! Adjacency matrix: a vertex count line, a line of vertex ids, then one
//! row per listed id. `-1` marks a missing edge and the diagonal is ignored.
//! Ids are renumbered densely in the order they are listed.

use std::path::Path;

use clap::ValueEnum;
use ghs_core::{Graph, GraphError, GraphResult, NodeId};
use serde::{Deserialize, Serialize};

/// Text format of a graph file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GraphFormat {
    #[default]
    EdgeList,
    Matrix,
}

/// Read and parse a graph file
pub fn load_graph(path: impl AsRef<Path>, format: GraphFormat) -> GraphResult<Graph> {
    let text = std::fs::read_to_string(path)?;
    match format {
        GraphFormat::EdgeList => parse_edge_list(&text),
        GraphFormat::Matrix => parse_matrix(&text),
    }
}

/// Non-empty, non-comment lines with their 1-based line numbers
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
}

fn parse_error(line: usize, reason: impl Into<String>) -> GraphError {
    GraphError::Parse {
        line,
        reason: reason.into(),
    }
}

fn parse_field<T: std::str::FromStr>(line: usize, field: &str, what: &str) -> GraphResult<T> {
    field
        .parse()
        .map_err(|_| parse_error(line, format!("invalid {} '{}'", what, field)))
}

/// Parse the edge-list format
pub fn parse_edge_list(text: &str) -> GraphResult<Graph> {
    let mut lines = content_lines(text);

    let (line, field) = lines
        .next()
        .ok_or_else(|| parse_error(0, "missing vertex count"))?;
    let vertex_count: usize = parse_field(line, field, "vertex count")?;

    let (line, field) = lines
        .next()
        .ok_or_else(|| parse_error(line, "missing edge count"))?;
    let edge_count: usize = parse_field(line, field, "edge count")?;

    let mut graph = Graph::new(vertex_count);
    let mut last_line = line;
    for (line, content) in lines {
        let fields: Vec<&str> = content.split_whitespace().collect();
        let [u, v, weight] = fields.as_slice() else {
            return Err(parse_error(line, "expected 'u v weight'"));
        };
        let u: u32 = parse_field(line, u, "vertex")?;
        let v: u32 = parse_field(line, v, "vertex")?;
        let weight: f64 = parse_field(line, weight, "weight")?;
        graph.add_edge(NodeId(u), NodeId(v), weight)?;
        last_line = line;
    }

    if graph.edge_count() != edge_count {
        return Err(parse_error(
            last_line,
            format!("expected {} edges, found {}", edge_count, graph.edge_count()),
        ));
    }
    Ok(graph)
}

/// Parse the adjacency-matrix format
pub fn parse_matrix(text: &str) -> GraphResult<Graph> {
    let mut lines = content_lines(text);

    let (line, field) = lines
        .next()
        .ok_or_else(|| parse_error(0, "missing vertex count"))?;
    let n: usize = parse_field(line, field, "vertex count")?;

    let (line, ids) = lines
        .next()
        .ok_or_else(|| parse_error(line, "missing vertex id line"))?;
    let ids: Vec<&str> = ids.split_whitespace().collect();
    if ids.len() != n {
        return Err(parse_error(
            line,
            format!("expected {} vertex ids, found {}", n, ids.len()),
        ));
    }

    let mut matrix: Vec<Vec<Option<f64>>> = Vec::with_capacity(n);
    let mut row_lines = Vec::with_capacity(n);
    for (line, row) in lines.by_ref().take(n) {
        let cells: Vec<&str> = row.split_whitespace().collect();
        if cells.len() != n {
            return Err(parse_error(
                line,
                format!("expected {} columns, found {}", n, cells.len()),
            ));
        }
        let mut parsed = Vec::with_capacity(n);
        for cell in cells {
            let weight: f64 = parse_field(line, cell, "weight")?;
            parsed.push((weight != -1.0).then_some(weight));
        }
        matrix.push(parsed);
        row_lines.push(line);
    }
    if matrix.len() != n {
        return Err(parse_error(
            row_lines.last().copied().unwrap_or(line),
            format!("expected {} matrix rows, found {}", n, matrix.len()),
        ));
    }
    if let Some((line, _)) = lines.next() {
        return Err(parse_error(line, "unexpected content after matrix"));
    }

    let mut adjacency = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            match (matrix[i][j], matrix[j][i]) {
                (Some(weight), Some(_)) => adjacency[i].push((NodeId(j as u32), weight)),
                (None, None) => {}
                _ => {
                    return Err(parse_error(
                        row_lines[i],
                        format!("edge {}-{} is listed in one direction only", ids[i], ids[j]),
                    ));
                }
            }
        }
    }
    Graph::from_adjacency(&adjacency)
}
