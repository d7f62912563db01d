//! Watch/Informer Bridge
//!
//! Turns a `kube` watcher stream into add/update/delete callbacks with
//! before/after snapshots, keeping the latest objects in a reflector
//! [`Store`]. The store doubles as the read-through cache other components
//! query by namespace/name.

use crate::crd::WebServerCluster;
use futures::StreamExt;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::watcher::{self, watcher, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives change notifications for objects of kind `K`
pub trait EventHandler<K>: Send + Sync {
    fn on_add(&self, obj: Arc<K>);

    fn on_update(&self, old: Arc<K>, new: Arc<K>);

    fn on_delete(&self, obj: Arc<K>);
}

impl<K, T: EventHandler<K> + ?Sized> EventHandler<K> for Arc<T> {
    fn on_add(&self, obj: Arc<K>) {
        (**self).on_add(obj)
    }

    fn on_update(&self, old: Arc<K>, new: Arc<K>) {
        (**self).on_update(old, new)
    }

    fn on_delete(&self, obj: Arc<K>) {
        (**self).on_delete(obj)
    }
}

/// Lookup of WebServerCluster snapshots by namespace/name
pub trait ClusterCache: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<WebServerCluster>>;
}

impl ClusterCache for Store<WebServerCluster> {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<WebServerCluster>> {
        Store::get(self, &ObjectRef::new(name).within(namespace))
    }
}

pub struct Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    api: Api<K>,
    config: watcher::Config,
    resync: Option<Duration>,
    cache: EventCache<K>,
}

impl<K> Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// `resync` of `None` or zero disables periodic re-delivery
    pub fn new(api: Api<K>, config: watcher::Config, resync: Option<Duration>) -> Self {
        Self {
            api,
            config,
            resync: resync.filter(|d| !d.is_zero()),
            cache: EventCache::new(),
        }
    }

    /// Read handle on the informer's cache
    pub fn store(&self) -> Store<K> {
        self.cache.store.clone()
    }

    /// Deliver events to `handler` until `shutdown` is cancelled
    pub async fn run<H: EventHandler<K>>(mut self, handler: H, shutdown: CancellationToken) {
        let kind = K::kind(&()).to_string();
        info!(kind = %kind, "Starting informer");

        let mut events = watcher(self.api, self.config).default_backoff().boxed();
        let mut resync = self.resync.map(|period| {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick(&mut resync) => {
                    debug!(kind = %kind, "Resyncing informer cache");
                    self.cache.resync(&handler);
                }
                event = events.next() => match event {
                    Some(Ok(event)) => self.cache.apply(event, &handler),
                    Some(Err(e)) => warn!(kind = %kind, error = %e, "Watch stream error"),
                    None => break,
                },
            }
        }

        info!(kind = %kind, "Informer stopped");
    }
}

/// Reflector store plus the bookkeeping needed to diff relists
struct EventCache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    store: Store<K>,
    writer: Writer<K>,
    relist: Vec<K>,
}

impl<K> EventCache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    fn new() -> Self {
        let (store, writer) = reflector::store();
        Self {
            store,
            writer,
            relist: Vec::new(),
        }
    }

    fn resync<H: EventHandler<K> + ?Sized>(&self, handler: &H) {
        for obj in self.store.state() {
            handler.on_update(obj.clone(), obj);
        }
    }

    fn apply<H: EventHandler<K> + ?Sized>(&mut self, event: Event<K>, handler: &H) {
        match event {
            Event::Apply(ref obj) => {
                let key = ObjectRef::from_obj(obj);
                let old = self.store.get(&key);
                self.writer.apply_watcher_event(&event);
                let new = self
                    .store
                    .get(&key)
                    .unwrap_or_else(|| Arc::new(obj.clone()));
                match old {
                    Some(old) => handler.on_update(old, new),
                    None => handler.on_add(new),
                }
            }
            Event::Delete(ref obj) => {
                let key = ObjectRef::from_obj(obj);
                let last = self
                    .store
                    .get(&key)
                    .unwrap_or_else(|| Arc::new(obj.clone()));
                self.writer.apply_watcher_event(&event);
                handler.on_delete(last);
            }
            Event::Init => {
                self.relist.clear();
                self.writer.apply_watcher_event(&event);
            }
            Event::InitApply(ref obj) => {
                self.relist.push(obj.clone());
                self.writer.apply_watcher_event(&event);
            }
            Event::InitDone => {
                let mut previous: HashMap<ObjectRef<K>, Arc<K>> = self
                    .store
                    .state()
                    .into_iter()
                    .map(|obj| (ObjectRef::from_obj(obj.as_ref()), obj))
                    .collect();
                self.writer.apply_watcher_event(&event);

                for obj in std::mem::take(&mut self.relist) {
                    let key = ObjectRef::from_obj(&obj);
                    let new = self.store.get(&key).unwrap_or_else(|| Arc::new(obj));
                    match previous.remove(&key) {
                        Some(old) => handler.on_update(old, new),
                        None => handler.on_add(new),
                    }
                }
                for (_, gone) in previous {
                    handler.on_delete(gone);
                }
            }
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cluster;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    fn name(obj: &WebServerCluster) -> &str {
        obj.metadata.name.as_deref().unwrap_or_default()
    }

    impl EventHandler<WebServerCluster> for Recorder {
        fn on_add(&self, obj: Arc<WebServerCluster>) {
            self.events.lock().push(format!("add {}", name(&obj)));
        }

        fn on_update(&self, old: Arc<WebServerCluster>, new: Arc<WebServerCluster>) {
            self.events.lock().push(format!(
                "update {} {:?}->{:?}",
                name(&new),
                old.spec.replicas,
                new.spec.replicas
            ));
        }

        fn on_delete(&self, obj: Arc<WebServerCluster>) {
            self.events.lock().push(format!("delete {}", name(&obj)));
        }
    }

    #[test]
    fn test_apply_becomes_add_then_update() {
        let mut cache = EventCache::new();
        let recorder = Recorder::default();

        cache.apply(Event::Apply(cluster("web1", Some(3))), &recorder);
        cache.apply(Event::Apply(cluster("web1", Some(4))), &recorder);

        assert_eq!(
            *recorder.events.lock(),
            vec!["add web1", "update web1 Some(3)->Some(4)"]
        );
        let cached = ClusterCache::get(&cache.store, "default", "web1").unwrap();
        assert_eq!(cached.spec.replicas, Some(4));
    }

    #[test]
    fn test_delete_removes_from_cache() {
        let mut cache = EventCache::new();
        let recorder = Recorder::default();

        cache.apply(Event::Apply(cluster("web1", Some(3))), &recorder);
        cache.apply(Event::Delete(cluster("web1", Some(3))), &recorder);

        assert_eq!(recorder.events.lock().last().unwrap(), "delete web1");
        assert!(ClusterCache::get(&cache.store, "default", "web1").is_none());
    }

    #[test]
    fn test_relist_is_diffed_against_cache() {
        let mut cache = EventCache::new();
        let recorder = Recorder::default();

        cache.apply(Event::Apply(cluster("kept", Some(1))), &recorder);
        cache.apply(Event::Apply(cluster("gone", Some(1))), &recorder);
        recorder.events.lock().clear();

        cache.apply(Event::Init, &recorder);
        cache.apply(Event::InitApply(cluster("kept", Some(2))), &recorder);
        cache.apply(Event::InitApply(cluster("fresh", Some(1))), &recorder);
        cache.apply(Event::InitDone, &recorder);

        let events = recorder.events.lock().clone();
        assert_eq!(
            events,
            vec!["update kept Some(1)->Some(2)", "add fresh", "delete gone"]
        );
        assert!(ClusterCache::get(&cache.store, "default", "gone").is_none());
        assert!(ClusterCache::get(&cache.store, "default", "fresh").is_some());
    }

    #[test]
    fn test_resync_redelivers_cached_objects_unchanged() {
        let mut cache = EventCache::new();
        let recorder = Recorder::default();

        cache.apply(Event::Apply(cluster("web1", Some(3))), &recorder);
        recorder.events.lock().clear();
        cache.resync(&recorder);

        assert_eq!(
            *recorder.events.lock(),
            vec!["update web1 Some(3)->Some(3)"]
        );
    }
}
