use crate::Vector3D;
use super::SimpleSystem;

/// Cutoff used to build the neighbor lists of the test systems. This is larger
/// than the cutoffs used in tests, to check the re-filtering of neighbors.
pub const NEIGHBOR_CUTOFF: f64 = 6.0;

pub fn test_system(name: &str) -> SimpleSystem {
    let (species, positions): (Vec<usize>, Vec<Vector3D>) = match name {
        "methane" => get_methane(),
        "water" => get_water(),
        "CH" => get_ch(),
        _ => panic!("unknown test system {}", name)
    };

    return SimpleSystem::from_positions(&species, &positions, NEIGHBOR_CUTOFF, 125.0)
        .expect("invalid test system");
}

// species 0 is carbon, species 1 is hydrogen
fn get_methane() -> (Vec<usize>, Vec<Vector3D>) {
    let species = vec![0, 1, 1, 1, 1];
    let positions = vec![
        Vector3D::new(5.0000, 5.0000, 5.0000),
        Vector3D::new(5.5288, 5.1610, 5.9359),
        Vector3D::new(5.2051, 5.8240, 4.3214),
        Vector3D::new(5.3345, 4.0686, 4.5504),
        Vector3D::new(3.9315, 4.9463, 5.1921),
    ];
    return (species, positions);
}

// species 0 is oxygen, species 1 is hydrogen
fn get_water() -> (Vec<usize>, Vec<Vector3D>) {
    let species = vec![0, 1, 1];
    let positions = vec![
        Vector3D::new(0.0, 0.0, 0.0),
        Vector3D::new(0.0, 0.75545, -0.58895),
        Vector3D::new(0.0, -0.75545, -0.58895),
    ];
    return (species, positions);
}

fn get_ch() -> (Vec<usize>, Vec<Vector3D>) {
    let species = vec![0, 1];
    let positions = vec![
        Vector3D::new(0.0, 0.0, 0.0),
        Vector3D::new(0.0, 1.2, 0.0),
    ];
    return (species, positions);
}
