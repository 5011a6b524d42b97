use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use wakil::prelude::*;

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Injectable)]
struct Alpha;

impl Plugin for Alpha {
    fn name(&self) -> &'static str {
        "alpha"
    }
}

#[derive(Injectable)]
struct Beta;

impl Plugin for Beta {
    fn name(&self) -> &'static str {
        "beta"
    }
}

upcast!(Alpha => dyn Plugin);
upcast!(Beta => dyn Plugin);

struct Settings {
    retries: u32,
}

#[derive(Injectable)]
struct Host {
    settings: Arc<Settings>,
    plugins: Vec<Arc<dyn Plugin>>,
    provider: Provider,
    #[inject(default)]
    calls: AtomicU32,
}

#[derive(Injectable)]
struct Pair(Arc<Settings>, #[inject(name = "extras")] Vec<Arc<dyn Plugin>>);

#[test]
fn named_fields_become_parameters() {
    let names: Vec<_> = Host::parameters().iter().map(Parameter::name).collect();
    assert_eq!(names, vec!["settings", "plugins", "provider"]);

    let keys: Vec<_> = Host::parameters().iter().filter_map(Parameter::key).collect();
    assert_eq!(keys[0], ServiceKey::of::<Settings>());
    assert_eq!(keys[1], ServiceKey::list_of::<dyn Plugin>());
    assert_eq!(keys[2], ServiceKey::of::<Provider>());
}

#[test]
fn tuple_fields_use_index_or_rename() {
    let names: Vec<_> = Pair::parameters().iter().map(Parameter::name).collect();
    assert_eq!(names, vec!["0", "extras"]);
}

#[test]
fn derived_type_resolves_its_fields() {
    let root = Provider::builder()
        .instance(Arc::new(Settings { retries: 3 }))
        .singleton_as::<dyn Plugin, Alpha>()
        .transient_as::<dyn Plugin, Beta>()
        .scoped::<Host>()
        .transient::<Pair>()
        .build()
        .unwrap();

    let scope = root.scope().unwrap();
    let host = scope.require::<Host>().unwrap();
    assert_eq!(host.settings.retries, 3);
    assert_eq!(host.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(), vec!["alpha", "beta"]);
    assert!(host.provider.same_scope(&scope));
    assert_eq!(host.calls.fetch_add(1, Ordering::SeqCst), 0);

    let pair = root.require::<Pair>().unwrap();
    assert_eq!(pair.0.retries, 3);
    assert_eq!(pair.1.len(), 2);
}

#[derive(Injectable)]
#[injectable(disposable)]
struct Connection {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Disposable for Connection {
    fn enter(&self) {
        self.log.lock().unwrap().push("open");
    }

    fn exit(&self, _outcome: &Outcome<'_>) {
        self.log.lock().unwrap().push("close");
    }
}

#[test]
fn disposable_attribute_registers_for_release() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let root = Provider::builder()
        .instance(log.clone())
        .scoped::<Connection>()
        .build()
        .unwrap();

    let scope = root.scope().unwrap();
    scope.require::<Connection>().unwrap();
    scope.require::<Connection>().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["open"]);

    scope.close();
    assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
}

#[derive(Injectable)]
struct Repository<T: Send + Sync + 'static> {
    settings: Arc<Settings>,
    #[inject(default)]
    marker: PhantomData<fn() -> T>,
}

struct User;

#[test]
fn generic_struct_derives() {
    let root = Provider::builder()
        .instance(Arc::new(Settings { retries: 1 }))
        .singleton::<Repository<User>>()
        .build()
        .unwrap();

    let repository = root.require::<Repository<User>>().unwrap();
    assert_eq!(repository.settings.retries, 1);
    let _ = &repository.marker;
}
