//! WGSL source generation for the statistics program
//!
//! The group size is baked into the source (workgroup size, scratch array
//! length and the stride constant), so one module is generated per group
//! size and cached under [`program_name`](super::program_name).

use crate::geometry::ReductionKind;

/// Every entry point the generated module exports
pub const ENTRY_POINTS: &[&str] = &[
    "reduce_min",
    "reduce_max",
    "reduce_sum",
    "collapse_min",
    "collapse_max",
    "collapse_sum",
    "variance",
    "variance_sum",
    "collapse_variance_sum",
    "sort_bubble",
    "sort_selection",
    "sort_selection_tiled",
];

fn op_name(kind: ReductionKind) -> &'static str {
    match kind {
        ReductionKind::Min => "min",
        ReductionKind::Max => "max",
        ReductionKind::Sum => "sum",
    }
}

fn identity(kind: ReductionKind) -> &'static str {
    match kind {
        ReductionKind::Min => "2147483647",
        ReductionKind::Max => "-2147483648",
        ReductionKind::Sum => "0",
    }
}

fn combine_expr(kind: ReductionKind) -> &'static str {
    match kind {
        ReductionKind::Min => "min(a, b)",
        ReductionKind::Max => "max(a, b)",
        ReductionKind::Sum => "a + b",
    }
}

/// Combine helper, in-scratch tree reduction, per-group pass and collapse
/// pass for one reduction kind.
fn generate_reduction(kind: ReductionKind) -> String {
    let op = op_name(kind);
    let id = identity(kind);
    let expr = combine_expr(kind);

    format!(
        r#"
fn combine_{op}(a: i32, b: i32) -> i32 {{
    return {expr};
}}

fn tree_{op}(l: u32) {{
    for (var stride: u32 = 1u; stride < WG; stride = stride * 2u) {{
        if (l % (2u * stride) == 0u && l + stride < WG) {{
            scratch[l] = combine_{op}(scratch[l], scratch[l + stride]);
        }}
        workgroupBarrier();
    }}
}}

@compute @workgroup_size(WG)
fn reduce_{op}(@builtin(local_invocation_id) lid: vec3<u32>,
               @builtin(workgroup_id) wid: vec3<u32>) {{
    let l = lid.x;
    let gi = wid.x * WG + l;
    var v: i32 = {id};
    if (gi < params.len) {{
        v = input[gi];
    }}
    scratch[l] = v;
    workgroupBarrier();
    tree_{op}(l);
    if (l == 0u) {{
        output[wid.x] = scratch[0];
    }}
}}

@compute @workgroup_size(WG)
fn collapse_{op}(@builtin(local_invocation_id) lid: vec3<u32>) {{
    let l = lid.x;
    var acc: i32 = {id};
    for (var i: u32 = l; i < params.len; i = i + WG) {{
        acc = combine_{op}(acc, output[i]);
    }}
    scratch[l] = acc;
    workgroupBarrier();
    tree_{op}(l);
    if (l == 0u) {{
        output[0] = scratch[0];
    }}
}}
"#
    )
}

const VARIANCE: &str = r#"
@compute @workgroup_size(WG)
fn variance(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.len) {
        return;
    }
    if (i < params.count) {
        let d = input[i] - params.mean;
        output[i] = d * d;
    } else {
        output[i] = 0;
    }
}

@compute @workgroup_size(WG)
fn variance_sum(@builtin(local_invocation_id) lid: vec3<u32>,
                @builtin(workgroup_id) wid: vec3<u32>) {
    let l = lid.x;
    let gi = wid.x * WG + l;
    var v: i32 = 0;
    if (gi < params.len) {
        v = input[gi];
    }
    scratch[l] = v;
    workgroupBarrier();
    tree_sum(l);
    if (l == 0u) {
        output[wid.x] = scratch[0];
    }
}

// Quotients and remainders are summed apart so the total is divided once,
// whatever the group count.
@compute @workgroup_size(WG)
fn collapse_variance_sum(@builtin(local_invocation_id) lid: vec3<u32>) {
    let l = lid.x;
    let divisor = params.scale * params.scale;
    var q: i32 = 0;
    var r: i32 = 0;
    for (var i: u32 = l; i < params.len; i = i + WG) {
        q = q + output[i] / divisor;
        r = r + output[i] % divisor;
    }
    scratch[l] = q;
    workgroupBarrier();
    tree_sum(l);
    let quotients = scratch[0];
    workgroupBarrier();
    scratch[l] = r;
    workgroupBarrier();
    tree_sum(l);
    if (l == 0u) {
        output[0] = quotients + scratch[0] / divisor;
    }
}
"#;

const SORTS: &str = r#"
@compute @workgroup_size(WG)
fn sort_bubble(@builtin(local_invocation_id) lid: vec3<u32>) {
    let l = lid.x;
    let n = params.len;
    for (var i: u32 = l; i < n; i = i + WG) {
        output[i] = input[i];
    }
    storageBarrier();
    for (var phase: u32 = 0u; phase < n; phase = phase + 1u) {
        for (var i: u32 = (phase % 2u) + 2u * l; i + 1u < n; i = i + 2u * WG) {
            let a = output[i];
            let b = output[i + 1u];
            if (b < a) {
                output[i] = b;
                output[i + 1u] = a;
            }
        }
        storageBarrier();
    }
}

fn ordered_before(w: i32, j: u32, v: i32, i: u32) -> bool {
    return w < v || (w == v && j < i);
}

@compute @workgroup_size(WG)
fn sort_selection(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    let n = params.len;
    if (i >= n) {
        return;
    }
    let v = input[i];
    var rank: u32 = 0u;
    for (var j: u32 = 0u; j < n; j = j + 1u) {
        if (ordered_before(input[j], j, v, i)) {
            rank = rank + 1u;
        }
    }
    output[rank] = v;
}

@compute @workgroup_size(WG)
fn sort_selection_tiled(@builtin(global_invocation_id) gid: vec3<u32>,
                        @builtin(local_invocation_id) lid: vec3<u32>) {
    let i = gid.x;
    let l = lid.x;
    let n = params.len;
    var v: i32 = 0;
    if (i < n) {
        v = input[i];
    }
    var rank: u32 = 0u;
    for (var base: u32 = 0u; base < n; base = base + WG) {
        if (base + l < n) {
            scratch[l] = input[base + l];
        }
        workgroupBarrier();
        let tile = min(WG, n - base);
        for (var k: u32 = 0u; k < tile; k = k + 1u) {
            if (ordered_before(scratch[k], base + k, v, i)) {
                rank = rank + 1u;
            }
        }
        workgroupBarrier();
    }
    if (i < n) {
        output[rank] = v;
    }
}
"#;

/// Generate the complete statistics module for `group_size`.
pub fn generate_statistics_shader(group_size: usize) -> String {
    let mut src = format!(
        r#"// Auto-generated statistics kernels, group size {group_size}

const WG: u32 = {group_size}u;

struct Params {{
    len: u32,
    count: u32,
    mean: i32,
    scale: i32,
}}

@group(0) @binding(0) var<storage, read> input: array<i32>;
@group(0) @binding(1) var<storage, read_write> output: array<i32>;
@group(0) @binding(2) var<uniform> params: Params;

var<workgroup> scratch: array<i32, {group_size}>;
"#
    );

    for kind in [ReductionKind::Min, ReductionKind::Max, ReductionKind::Sum] {
        src.push_str(&generate_reduction(kind));
    }
    src.push_str(VARIANCE);
    src.push_str(SORTS);
    src.replace("@workgroup_size(WG)", &format!("@workgroup_size({group_size})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse and validate WGSL with the naga front-end re-exported by wgpu
    fn validate_wgsl(source: &str) -> std::result::Result<(), String> {
        use wgpu::naga::front::wgsl;
        use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

        let module = wgsl::Frontend::new()
            .parse(source)
            .map_err(|e| format!("WGSL parse error: {e}"))?;
        Validator::new(ValidationFlags::all(), Capabilities::default())
            .validate(&module)
            .map(|_| ())
            .map_err(|e| format!("WGSL validation error: {e}"))
    }

    #[test]
    fn test_group_size_is_baked_in() {
        let src = generate_statistics_shader(64);
        assert!(src.contains("const WG: u32 = 64u;"));
        assert!(src.contains("array<i32, 64>"));
        assert!(src.contains("@workgroup_size(64)"));
        assert!(!src.contains("@workgroup_size(WG)"));
    }

    #[test]
    fn test_every_entry_point_is_generated() {
        let src = generate_statistics_shader(8);
        for entry in ENTRY_POINTS {
            assert!(src.contains(&format!("fn {entry}(")), "missing {entry}");
        }
    }

    #[test]
    fn test_shader_validates_for_edge_group_sizes() {
        for g in [1, 3, 5, 64, 256] {
            let src = generate_statistics_shader(g);
            validate_wgsl(&src).unwrap_or_else(|e| {
                panic!("Invalid WGSL for group size {g}:\n{e}\n\nShader:\n{src}")
            });
        }
    }
}
