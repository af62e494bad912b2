pub mod kinematics;
pub mod sample;

pub use kinematics::{
    average_speed, current_speed, distance, duration, duration_to, great_circle_distance,
    DistanceAccumulator,
};
pub use sample::{Sample, Track};
