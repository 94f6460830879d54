use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use capture_harness::demo::{self, CalculatorApp, CalculatorViewModel};
use capture_harness::ui::{AppLifetime, WidgetKind};

fn benchmark_dispatch(c: &mut Criterion) {
    let app = match AppLifetime::launch(CalculatorApp::new(), Duration::from_secs(5)) {
        Ok(app) => app,
        Err(err) => panic!("launch failed: {}", err),
    };
    let dispatcher = app.dispatcher().clone();

    c.bench_function("invoke_round_trip", |b| {
        b.iter(|| {
            let title = dispatcher.invoke(Duration::from_secs(1), |ctx| ctx.window().title().len());
            assert!(black_box(title).is_ok());
        })
    });

    c.bench_function("read_result_text", |b| {
        b.iter(|| {
            let text = dispatcher.invoke(Duration::from_secs(1), |ctx| {
                let result = ctx.window().find(demo::RESULT, WidgetKind::TextBlock)?;
                ctx.window().text(&result)
            });
            assert!(black_box(text).is_ok());
        })
    });

    c.bench_function("wait_for_idle", |b| {
        b.iter(|| {
            assert!(dispatcher.wait_for_idle(Duration::from_secs(1)).is_ok());
        })
    });
}

fn benchmark_view_model(c: &mut Criterion) {
    c.bench_function("view_model_add", |b| {
        b.iter(|| {
            let mut vm = CalculatorViewModel {
                first_number: black_box("6".to_string()),
                second_number: black_box("3".to_string()),
                ..Default::default()
            };
            vm.add();
            vm.result
        })
    });
}

criterion_group!(benches, benchmark_dispatch, benchmark_view_model);
criterion_main!(benches);
