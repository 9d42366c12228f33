//! Static op properties consulted before compilation.

/// Input positions of `op` that must be known at compile time.
pub fn compile_time_const_inputs(op: &str) -> &'static [usize] {
    match op {
        "Reshape" | "Transpose" => &[1],
        _ => &[],
    }
}

/// Ops that forward their single input unchanged.
pub fn is_forwarding(op: &str) -> bool {
    matches!(op, "Identity" | "IdentityN" | "StopGradient")
}
