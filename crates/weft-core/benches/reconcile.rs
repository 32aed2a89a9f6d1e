use std::cell::Cell;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weft_core::{
    use_state, Descriptor, ManualScheduler, Output, Props, RenderError, Root, Scheduler,
};
use weft_macros::component;

const ROW_SAMPLES: &[usize] = &[16, 256];

thread_local! {
    static ROTATION: Cell<usize> = const { Cell::new(0) };
}

#[component]
fn Row(props: &Props) -> Result<Output, RenderError> {
    let (_selected, _set) = use_state(false)?;
    let _label = props.get_str("label");
    Ok(Output::empty())
}

#[component]
fn Table(props: &Props) -> Result<Output, RenderError> {
    let rows = props.get_int("rows").unwrap_or(0) as usize;
    let shift = ROTATION.with(Cell::get);
    Ok((0..rows)
        .map(|index| {
            let id = (index + shift) % rows.max(1);
            Row.el()
                .key(format!("row-{id}"))
                .prop("label", format!("Row {id}"))
                .build()
        })
        .collect::<Vec<Descriptor>>()
        .into())
}

struct TableFixture {
    scheduler: Scheduler,
    root: Root,
}

impl TableFixture {
    fn new(rows: usize) -> Self {
        let scheduler = Scheduler::new(Arc::new(ManualScheduler));
        let root = Root::new(&scheduler, Table.el().prop("rows", rows as i64));
        root.mount().expect("mount table");
        Self { scheduler, root }
    }

    fn rerender(&self) {
        self.root.node().schedule_render();
        self.scheduler.drain().expect("drain");
    }
}

fn bench_stable_rerender(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_stable");
    for &rows in ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            ROTATION.with(|rotation| rotation.set(0));
            let fixture = TableFixture::new(rows);
            b.iter(|| {
                fixture.rerender();
                black_box(fixture.root.node().child_count());
            });
        });
    }
    group.finish();
}

fn bench_rotating_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_rotate");
    for &rows in ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            let fixture = TableFixture::new(rows);
            b.iter(|| {
                ROTATION.with(|rotation| rotation.set(rotation.get() + 1));
                fixture.rerender();
            });
        });
    }
    group.finish();
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("mount");
    for &rows in ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            b.iter(|| {
                let fixture = TableFixture::new(rows);
                fixture.root.shutdown();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_stable_rerender,
    bench_rotating_keys,
    bench_mount
);
criterion_main!(benches);
