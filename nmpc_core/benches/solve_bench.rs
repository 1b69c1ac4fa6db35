use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DVector;
use nmpc_core::{HorizonParams, HorizonProblem, LevenbergMarquardt, NlpSolver, Reference, StateVec};
use vehicle_models::BicycleModel;

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    let model = BicycleModel::default();
    let solver = LevenbergMarquardt::default();

    for (np, nc) in [(5, 2), (10, 3), (20, 10)] {
        let params = HorizonParams {
            prediction_horizon: np,
            control_horizon: nc,
            dt: 0.05,
            ..Default::default()
        };
        let x0 = StateVec::new(10.0, 0.1, 0.0, 0.0, 0.0, 0.0);
        group.bench_function(format!("np{np}_nc{nc}"), |b| {
            b.iter(|| {
                let problem = HorizonProblem::build(
                    &model,
                    &params,
                    &x0,
                    Reference::new(0.2, 2.0),
                )
                .unwrap();
                black_box(solver.solve(&problem, &DVector::zeros(nc)).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
