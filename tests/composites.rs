// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use observable_collections::{
    ChangeKind, CollectionOptions, ConcurrentObservableList, DispatchContext, Error,
    FilterableCollection, ListAdapter, MasterSlaveAdapter, MasterSlaveList, PropertyName,
    QueueContext, SharedList, prelude::*,
};
use std::{
    sync::{Arc, Mutex},
    thread,
};

#[derive(Debug, Clone, PartialEq)]
struct Contact {
    name: &'static str,
    favourite: bool,
}

fn contact(name: &'static str, favourite: bool) -> Contact {
    Contact { name, favourite }
}

fn ui_options() -> (Arc<QueueContext>, CollectionOptions) {
    let ui = QueueContext::new();
    let context: Arc<dyn DispatchContext> = ui.clone();
    (ui, CollectionOptions::default().with_context(context))
}

fn shared<T>(items: Vec<T>, options: &CollectionOptions) -> SharedList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Arc::new(ConcurrentObservableList::from_adapter(
        ListAdapter::from(items),
        options.clone(),
    ))
}

/// Local contacts are editable, the directory is read-only; a view narrows both by name.
#[test]
fn address_book() {
    let (ui, options) = ui_options();
    let local = shared(vec![contact("ada", true), contact("bob", false)], &options);
    let directory = shared(vec![contact("alan", false), contact("grace", true)], &options);

    let book: Arc<MasterSlaveList<Contact>> =
        Arc::new(MasterSlaveList::with_options(options.clone()));
    book.set_master(Arc::clone(&local)).unwrap();
    book.set_slave(Arc::clone(&directory)).unwrap();
    assert_eq!(book.count().unwrap(), 4);
    assert_eq!(book.get(3).unwrap().name, "grace");

    let view = FilterableCollection::<MasterSlaveAdapter<Contact>, String>::with_predicate(
        Arc::clone(&book),
        |contact, prefix| contact.name.starts_with(prefix.as_str()),
        options,
    );
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let properties = Arc::new(Mutex::new(Vec::new()));
    {
        let kinds = Arc::clone(&kinds);
        view.on_collection_changed(move |change| kinds.lock().unwrap().push(change.kind()));
        let properties = Arc::clone(&properties);
        view.on_property_changed(move |name| properties.lock().unwrap().push(*name));
    }

    view.set_filter(Some("a".to_owned()));
    let names: Vec<_> = view.iter().unwrap().map(|contact| contact.name).collect();
    assert_eq!(names, vec!["ada", "alan"]);

    // a change in the read-only part reaches the view through the composite
    directory.add(contact("anita", false)).unwrap();
    assert_eq!(view.count().unwrap(), 3);

    // adding through the view lands in the editable part
    view.add(contact("ann", true)).unwrap();
    assert_eq!(local.count().unwrap(), 3);
    assert!(view.contains(&contact("ann", true)).unwrap());

    view.set_filter(None);
    assert_eq!(view.count().unwrap(), 6);

    ui.run_pending();
    let kinds = kinds.lock().unwrap();
    assert!(!kinds.is_empty());
    assert!(kinds.iter().take(3).all(|kind| *kind == ChangeKind::Reset));
    assert!(properties.lock().unwrap().contains(&PropertyName::Filter));
}

#[test]
fn favourites_follow_their_toggle() {
    let list: Arc<ConcurrentObservableList<Contact>> = Arc::new(
        [contact("ada", true), contact("bob", false)]
            .into_iter()
            .collect(),
    );
    let view = FilterableCollection::with_predicate(
        Arc::clone(&list),
        |contact: &Contact, wanted: &bool| contact.favourite == *wanted,
        CollectionOptions::default(),
    );
    view.set_filter(Some(true));
    assert_eq!(view.to_vec().unwrap(), vec![contact("ada", true)]);

    list.set(1, contact("bob", true)).unwrap();
    assert_eq!(view.count().unwrap(), 2);

    list.remove_at(0).unwrap();
    assert_eq!(view.to_vec().unwrap(), vec![contact("bob", true)]);

    view.set_filter(Some(false));
    assert!(view.is_empty().unwrap());
}

#[test]
fn readers_of_the_view_race_with_writers() {
    let list: Arc<ConcurrentObservableList<u32>> = Arc::default();
    let view = Arc::new(FilterableCollection::with_predicate(
        Arc::clone(&list),
        |n: &u32, modulus: &u32| n % modulus == 0,
        CollectionOptions::default(),
    ));
    view.set_filter(Some(3));

    let writer = {
        let list = Arc::clone(&list);
        thread::spawn(move || {
            for n in 1..=300 {
                loop {
                    match list.add(n) {
                        Ok(()) => break,
                        Err(error) if error.is_timeout() => continue,
                        Err(error) => panic!("add failed: {error}"),
                    }
                }
            }
        })
    };
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let view = Arc::clone(&view);
            thread::spawn(move || {
                for _ in 0..100 {
                    match view.to_vec() {
                        Ok(items) => assert!(items.iter().all(|n| n % 3 == 0)),
                        Err(error) => assert!(error.is_timeout(), "read failed: {error}"),
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    // every read after the last write sees all of it
    assert_eq!(view.count().unwrap(), 100);
}

#[test]
fn a_composite_without_master_is_read_only() {
    let directory = shared(vec![1, 2, 3], &CollectionOptions::default());
    let list: MasterSlaveList<i32> = MasterSlaveList::new();
    list.set_slave(Arc::clone(&directory)).unwrap();

    assert_eq!(list.to_vec().unwrap(), vec![1, 2, 3]);
    assert_eq!(
        list.push(4).unwrap_err(),
        Error::InvalidArgument("no master list set")
    );
    assert_eq!(
        list.remove_at(0).unwrap_err(),
        Error::InvalidArgument("slave lists are read-only")
    );
}
