/// Per-parameter weight decay.
///
/// With `filter_bias_and_norm`, biases, affine normalisation parameters,
/// mean shifts and anything in `skip` get no decay. Otherwise every
/// parameter gets `weight_decay`.
pub fn weight_decay_groups(
    names: &[String],
    skip: &[String],
    weight_decay: f64,
    filter_bias_and_norm: bool,
) -> Vec<f64> {
    names
        .iter()
        .map(|name| {
            if filter_bias_and_norm && is_no_decay(name, skip) {
                0.0
            } else {
                weight_decay
            }
        })
        .collect()
}

fn is_no_decay(name: &str, skip: &[String]) -> bool {
    name.ends_with(".bias")
        || name.ends_with(".affine_weight")
        || name.ends_with(".affine_bias")
        || name.ends_with(".mean_shift")
        || name.contains("bias.")
        || skip.iter().any(|s| s == name)
}
