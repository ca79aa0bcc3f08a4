use glint::prelude::*;
use uom::si::{
    f64::{Length, Time},
    length::meter,
    time::second,
    velocity::meter_per_second,
};

const ORIGIN: (f64, f64) = (-76.4747, 44.2187);

fn sample(t: f64, east: f64, north: f64) -> PlatformState {
    let origin = GeoPoint::from_degrees(ORIGIN.0, ORIGIN.1);
    PlatformState::new(
        Time::new::<second>(t),
        metres_to_lon_lat(EnuOffset::from_metres(east, north), origin),
        Length::new::<meter>(60.0),
        Attitude::from_degrees(1.0, -2.0, 90.0),
    )
}

/// Eastbound at 8 m/s, sampled every 0.5 to 1.5 s.
fn eastbound(noise: impl Fn(usize) -> (f64, f64)) -> Vec<PlatformState> {
    let times = [0.0, 0.5, 1.5, 2.0, 3.5, 4.0, 4.5, 5.5, 6.0, 7.5, 8.0, 9.0, 10.0, 10.5, 12.0];
    times
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let (e, n) = noise(i);
            sample(t, 8.0 * t + e, n)
        })
        .collect()
}

#[test]
fn irregular_constant_velocity_track_converges() {
    let trajectory = Trajectory::new(eastbound(|_| (0.0, 0.0))).unwrap();
    let origin = trajectory.origin().unwrap();
    let smoothed = Smoother::new(&SmootherParams::default())
        .unwrap()
        .smooth(&trajectory)
        .unwrap();

    assert_eq!(smoothed.len(), trajectory.len());
    for (sample, input) in smoothed.iter().zip(trajectory.samples()).skip(3) {
        let truth = lon_lat_to_metres(input.position(), origin);
        let estimate = lon_lat_to_metres(sample.state().position(), origin);
        assert!((estimate.east_m() - truth.east_m()).abs() < 3.0);
        assert!(estimate.north_m().abs() < 3.0);

        // Everything but position is carried over.
        assert_eq!(sample.state().timestamp(), input.timestamp());
        assert_eq!(sample.state().altitude(), input.altitude());
        assert_eq!(sample.state().attitude(), input.attitude());
        assert_eq!(sample.raw_position(), input.position());
    }

    let speed = smoothed.last().unwrap().speed().get::<meter_per_second>();
    assert!((speed - 8.0).abs() < 0.5, "speed {speed}");
}

#[test]
fn corrections_report_the_removed_noise() {
    let noise = |i: usize| match i % 3 {
        0 => (2.5, -1.0),
        1 => (-2.0, 2.0),
        _ => (-0.5, -1.0),
    };
    let trajectory = Trajectory::new(eastbound(noise)).unwrap();
    let smoothed = Smoother::new(&SmootherParams::default())
        .unwrap()
        .smooth(&trajectory)
        .unwrap();

    let late = &smoothed[8..];
    let mean_correction = late
        .iter()
        .map(|s| {
            let c = s.correction().unwrap();
            c.east_m().hypot(c.north_m())
        })
        .sum::<f64>()
        / late.len() as f64;
    assert!(mean_correction > 0.5);
    assert!(mean_correction < 4.0);
}

#[test]
fn intervals_follow_timestamps() {
    let trajectory = Trajectory::new(eastbound(|_| (0.0, 0.0))).unwrap();
    let smoothed = Smoother::new(&SmootherParams::default())
        .unwrap()
        .smooth(&trajectory)
        .unwrap();

    let intervals: Vec<f64> = smoothed.iter().map(|s| s.interval().get::<second>()).collect();
    assert_eq!(&intervals[..4], &[0.0, 0.5, 1.0, 0.5]);
}

#[test]
fn backwards_time_fails_the_pass() {
    let mut samples = eastbound(|_| (0.0, 0.0));
    samples.swap(4, 5);
    assert!(matches!(
        Trajectory::new(samples),
        Err(Error::NonMonotonicTrajectory { index: 5, .. })
    ));
}

#[test]
fn missions_smooth_independently_in_parallel() {
    let smoother = Smoother::new(&SmootherParams::default()).unwrap();
    let good = Trajectory::new(eastbound(|_| (0.0, 0.0))).unwrap();

    let mut first_missing = eastbound(|_| (0.0, 0.0));
    first_missing[0] = first_missing[0].with_position(GeoPoint::from_degrees(f64::NAN, 44.0));
    let bad = Trajectory::new(first_missing).unwrap();

    let results = par_smooth(&smoother, &[good.clone(), bad, good]);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(Error::MissingSensorData { .. })
    ));
    assert_eq!(results[0].as_ref().unwrap(), results[2].as_ref().unwrap());
}

#[test]
fn smoothed_states_feed_the_pipeline() {
    let pipeline = Pipeline::new(&Config::new(MountParams {
        pixel_width: 64,
        pixel_height: 48,
        ..MountParams::with_offsets(-90.0, 0.0)
    }))
    .unwrap();

    let trajectory = Trajectory::new(eastbound(|_| (0.0, 0.0))).unwrap();
    let inputs: Vec<ImageInput> = pipeline
        .smooth(&trajectory)
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, sample)| ImageInput::from_sample(format!("IMG_{i:04}.JPG"), sample))
        .collect();

    let results = pipeline.par_process(&inputs);
    assert!(results.iter().all(Result::is_ok));

    let first = results[0].as_ref().unwrap();
    let last = results.last().unwrap().as_ref().unwrap();
    let first_centre = first.frame.reference_points().centre.unwrap();
    let last_centre = last.frame.reference_points().centre.unwrap();
    assert!(last_centre.lon_deg() > first_centre.lon_deg());
}
