// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use observable_collections::{
    CollectionOptions, ConcurrentObservableDictionary, ConcurrentObservableList, DispatchContext,
    FilterableCollection, ListAdapter, MasterSlaveList, QueueContext, SharedList, prelude::*,
};
use std::{hint::black_box, sync::Arc};
use tango_bench::{IntoBenchmarks, benchmark_fn, tango_benchmarks, tango_main};

const LEN: u64 = 1024;

fn list_benchmarks() -> impl IntoBenchmarks {
    observable_collections::enable_determinism();

    let list: &'static ConcurrentObservableList<u64> = Box::leak(Box::new((0..LEN).collect()));

    let ui = QueueContext::new();
    let context: Arc<dyn DispatchContext> = ui.clone();
    let observed: &'static ConcurrentObservableList<u64> = Box::leak(Box::new(
        ConcurrentObservableList::from_adapter(
            ListAdapter::from((0..LEN).collect::<Vec<_>>()),
            CollectionOptions::default().with_context(context),
        ),
    ));
    observed.on_collection_changed(|change| {
        black_box(change);
    });
    let undoable: &'static ConcurrentObservableList<u64> = Box::leak(Box::new(
        ConcurrentObservableList::with_options(CollectionOptions::default().with_undo_limit(64)),
    ));

    [
        benchmark_fn("list::get", move |b| {
            b.iter(move || black_box(list).get(LEN as usize / 2))
        }),
        benchmark_fn("list::push_pop", move |b| {
            b.iter(move || {
                let index = black_box(list).push(black_box(7)).unwrap();
                list.remove_at(index)
            })
        }),
        benchmark_fn("list::iter", move |b| {
            b.iter(move || black_box(list).iter().map(|items| items.sum::<u64>()))
        }),
        benchmark_fn("list::push_pop_observed", move |b| {
            let ui = Arc::clone(&ui);
            b.iter(move || {
                let index = black_box(observed).push(black_box(7)).unwrap();
                let removed = observed.remove_at(index);
                ui.run_pending();
                removed
            })
        }),
        benchmark_fn("list::push_undo", move |b| {
            b.iter(move || {
                black_box(undoable).push(black_box(7)).unwrap();
                undoable.undo()
            })
        }),
    ]
}

fn dictionary_benchmarks() -> impl IntoBenchmarks {
    observable_collections::enable_determinism();

    let dictionary: &'static ConcurrentObservableDictionary<u64, u64> =
        Box::leak(Box::new((0..LEN).map(|k| (k, k * 2)).collect()));

    [
        benchmark_fn("dictionary::get", move |b| {
            b.iter(move || black_box(dictionary).get(&(LEN / 2)))
        }),
        benchmark_fn("dictionary::set", move |b| {
            b.iter(move || black_box(dictionary).set(LEN / 2, black_box(1)))
        }),
        benchmark_fn("dictionary::insert_remove", move |b| {
            b.iter(move || {
                black_box(dictionary).insert(LEN, 0).unwrap();
                dictionary.remove_key(&LEN)
            })
        }),
    ]
}

fn composite_benchmarks() -> impl IntoBenchmarks {
    let shared = |range: std::ops::Range<u64>| -> SharedList<u64> { Arc::new(range.collect()) };

    let composite: &'static MasterSlaveList<u64> = Box::leak(Box::new(MasterSlaveList::new()));
    composite.set_master(shared(0..LEN)).unwrap();
    for slave in 1..8 {
        composite
            .set_slave(shared(slave * LEN..(slave + 1) * LEN))
            .unwrap();
    }

    let numbers: SharedList<u64> = shared(0..LEN * 8);
    let view: &'static FilterableCollection<ListAdapter<u64>, u64> =
        Box::leak(Box::new(FilterableCollection::with_predicate(
            Arc::clone(&numbers),
            |n: &u64, modulus: &u64| n % modulus == 0,
            CollectionOptions::default(),
        )));
    view.set_filter(Some(7));

    [
        benchmark_fn("master_slave::get_last", move |b| {
            b.iter(move || black_box(composite).get(LEN as usize * 8 - 1))
        }),
        benchmark_fn("master_slave::index_of", move |b| {
            b.iter(move || black_box(composite).index_of(&(LEN * 6)))
        }),
        benchmark_fn("filterable::count_cached", move |b| {
            b.iter(move || black_box(view).count())
        }),
        benchmark_fn("filterable::count_after_change", move |b| {
            let numbers = Arc::clone(&numbers);
            b.iter(move || {
                numbers.set(0, black_box(0)).unwrap();
                black_box(view).count()
            })
        }),
    ]
}

tango_benchmarks!(
    list_benchmarks(),
    dictionary_benchmarks(),
    composite_benchmarks()
);
tango_main!();
