//! Human-readable renderings of calls, for error messages and source dumps.

use itertools::Itertools;

use crate::{
    binding::BoundCall,
    signature::{
        HostCall,
        HostNode,
        KernelFunction,
    },
};

/// The host arguments as an indented tree.
pub fn host_call_tree(call: &HostCall) -> String {
    let mut out = String::new();
    for node in call.nodes() {
        write_host_node(&mut out, node, 1);
    }
    out
}

fn write_host_node(out: &mut String, node: &HostNode, depth: usize) {
    out.push_str(&format!(
        "{:indent$}{}: {}",
        "",
        node.name,
        node.value,
        indent = depth * 2
    ));
    if node.vector_mapping.is_valid() {
        out.push_str(&format!(" mapped {}", node.vector_mapping));
    }
    out.push('\n');

    for child in node.children.iter().flatten() {
        write_host_node(out, child, depth + 1);
    }
}

/// The host call and every candidate overload.
pub fn mismatch_info(call: &HostCall, overloads: &[KernelFunction]) -> String {
    let overloads = overloads
        .iter()
        .map(|function| format!("  #{}: {}", function.overload, function.desc))
        .join("\n");
    format!("arguments:\n{}overloads:\n{overloads}", host_call_tree(call))
}

const HEADER: [&str; 7] = [
    "path",
    "host",
    "vector type",
    "mapping",
    "dims",
    "access",
    "differentiable",
];

/// One row per bound variable, columns aligned.
pub fn bound_call_table(bindings: &BoundCall) -> String {
    let rows = bindings
        .nodes()
        .into_iter()
        .map(|node| {
            [
                node.path.clone(),
                node.value.to_string(),
                node.vector_type
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "?".to_owned()),
                node.vector_mapping.to_string(),
                node.call_dimensionality
                    .map(|dims| dims.to_string())
                    .unwrap_or_else(|| "?".to_owned()),
                node.access.to_string(),
                node.differentiable.to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = format_row(HEADER, &widths);
    out.push('\n');
    out.push_str(&widths.iter().map(|width| "-".repeat(*width)).join("-+-"));
    for row in &rows {
        out.push('\n');
        out.push_str(&format_row(row.iter().map(String::as_str), &widths));
    }
    out
}

fn format_row<'a>(cells: impl IntoIterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .into_iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:width$}"))
        .join(" | ")
        .trim_end()
        .to_owned()
}
