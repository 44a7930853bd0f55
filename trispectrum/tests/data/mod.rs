#![allow(dead_code)]

use trispectrum::{SimpleSystem, Vector3D, Matrix3};

/// Small molecular cluster with two species
pub fn cluster_positions() -> (Vec<usize>, Vec<Vector3D>) {
    let species = vec![0, 1, 1, 0, 1, 1, 1];
    let positions = vec![
        Vector3D::new(0.0, 0.0, 0.0),
        Vector3D::new(0.96, 0.12, -0.05),
        Vector3D::new(-0.31, 0.89, 0.22),
        Vector3D::new(1.45, 1.62, 0.37),
        Vector3D::new(2.04, 1.10, 0.98),
        Vector3D::new(1.18, 2.41, 0.93),
        Vector3D::new(-0.52, -0.74, 1.33),
    ];
    return (species, positions);
}

/// Build the cluster, with positions transformed by `rotation`
pub fn cluster(rotation: Matrix3, cutoff: f64) -> SimpleSystem {
    let (species, positions) = cluster_positions();
    let positions = positions.into_iter().map(|p| rotation * p).collect::<Vec<_>>();
    return SimpleSystem::from_positions(&species, &positions, cutoff, 0.0)
        .expect("invalid cluster");
}

/// JSON parameters for the `b3` calculator
pub fn b3_parameters(
    n_species: usize,
    n_radial: usize,
    max_angular: usize,
    radial_basis: &str,
    radial_hyps: &[f64],
    cutoff_function: &str,
    cutoff_hyps: &[f64],
) -> String {
    format!(r#"{{
        "n_species": {n_species},
        "n_radial": {n_radial},
        "max_angular": {max_angular},
        "radial_basis": "{radial_basis}",
        "radial_hyps": {radial_hyps:?},
        "cutoff_function": "{cutoff_function}",
        "cutoff_hyps": {cutoff_hyps:?}
    }}"#)
}
