use larder_ssm::{
    max_asymmetry, min_symmetric_eigenvalue, ModelParameters, StateSpaceModel, FEATURE_DIM,
};

/// Simple LCG so the sweep is deterministic without a rand dependency.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) as f64 / (1u64 << 31) as f64
    }
}

fn random_features(rng: &mut Lcg) -> [f64; FEATURE_DIM] {
    let mut features = [0.0; FEATURE_DIM];
    for f in features.iter_mut() {
        *f = rng.next_f64();
    }
    features
}

#[test]
fn covariance_and_state_invariants_hold_over_long_streams() {
    let quantity_max = 4.0;
    for seed in [1u64, 7, 42, 1234] {
        let mut rng = Lcg(seed);
        let model = StateSpaceModel::new(ModelParameters::defaults());
        let mut state = model.initialize(4.0, &[], Some(0.2), quantity_max);

        for step in 0..500 {
            let features = random_features(&mut rng);
            // Noisy sawtooth: mostly declining with occasional jumps.
            let y = if step % 17 == 0 {
                quantity_max * (0.5 + 0.5 * rng.next_f64())
            } else {
                (state.quantity() - 0.2 + 0.1 * (rng.next_f64() - 0.5)).max(0.0)
            };

            let (predicted, _) = model.predict(&state, &features);
            state = model.update(predicted, y, quantity_max).unwrap().state;

            assert!(
                max_asymmetry(state.p()) <= 1e-9,
                "seed {seed} step {step}: asymmetry {}",
                max_asymmetry(state.p())
            );
            assert!(
                min_symmetric_eigenvalue(state.p()) >= -1e-9,
                "seed {seed} step {step}: min eigenvalue {}",
                min_symmetric_eigenvalue(state.p())
            );
            assert!(state.rate() >= 0.0, "seed {seed} step {step}");
            assert!(state.trend() >= 0.0, "seed {seed} step {step}");
            assert!(
                (0.0..=10.0 * quantity_max).contains(&state.quantity()),
                "seed {seed} step {step}: q {}",
                state.quantity()
            );
        }
    }
}

#[test]
fn simulated_trajectories_are_non_increasing_under_any_features() {
    let model = StateSpaceModel::new(ModelParameters::defaults());
    let mut rng = Lcg(99);
    let state = model.initialize(4.0, &[], Some(0.3), 4.0);
    let features: Vec<[f64; FEATURE_DIM]> = (0..60).map(|_| random_features(&mut rng)).collect();
    let trajectory = model.simulate(&state, &features, 0.95).unwrap();
    for (day, pair) in trajectory.quantities().windows(2).enumerate() {
        assert!(
            pair[1] <= pair[0] + 1e-12,
            "day {day}: {} -> {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn filter_tracks_a_noisy_linear_decline() {
    let model = StateSpaceModel::new(ModelParameters::defaults());
    let mut rng = Lcg(5);
    let mut state = model.initialize(8.0, &[], None, 8.0);
    for day in 1..=30 {
        let y = (8.0 - 0.25 * day as f64 + 0.02 * (rng.next_f64() - 0.5)).max(0.0);
        let (predicted, _) = model.predict(&state, &[0.0; FEATURE_DIM]);
        state = model.update(predicted, y, 8.0).unwrap().state;
    }
    assert!(
        (state.rate() - 0.25).abs() < 0.08,
        "rate {} should be near 0.25",
        state.rate()
    );
}
