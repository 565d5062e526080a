use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use datagen_runtime::record::{cell, json, lock, xml_element};
use datagen_runtime::{DependencyGraph, Format, Metadata, Record, RecordGenerator, write_records};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
struct UserRecord {
    id: i64,
}

#[derive(Debug, Clone, Serialize)]
struct OrderRecord {
    id: i64,
    user_id: i64,
}

impl Record for UserRecord {
    fn csv_headers(&self) -> Vec<&'static str> {
        vec!["id"]
    }

    fn to_csv(&self) -> Vec<String> {
        vec![cell(&self.id)]
    }

    fn to_json(&self) -> Value {
        json(self)
    }

    fn to_xml(&self) -> String {
        xml_element("users", &[("id", cell(&self.id))])
    }

    fn serialise(&self) -> Vec<u8> {
        Vec::new()
    }
}

impl Record for OrderRecord {
    fn csv_headers(&self) -> Vec<&'static str> {
        vec!["id", "user_id"]
    }

    fn to_csv(&self) -> Vec<String> {
        vec![cell(&self.id), cell(&self.user_id)]
    }

    fn to_json(&self) -> Value {
        json(self)
    }

    fn to_xml(&self) -> String {
        xml_element(
            "orders",
            &[("id", cell(&self.id)), ("user_id", cell(&self.user_id))],
        )
    }

    fn serialise(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Memoized values shared by every referrer, computed the way generated field accessors do.
struct World {
    links: DependencyGraph,
    accounts: Mutex<Vec<i64>>,
    users: Mutex<Vec<i64>>,
}

fn memoized(
    links: &DependencyGraph,
    model: &str,
    cache: &Mutex<Vec<i64>>,
    iter: usize,
    produce: impl Fn(usize) -> i64,
) -> i64 {
    loop {
        let next = {
            let cache = lock(cache);
            if let Some(value) = cache.get(iter) {
                return *value;
            }
            cache.len()
        };
        let value = {
            let _scope = links.scope(model);
            produce(next)
        };
        let mut cache = lock(cache);
        if cache.len() == next {
            cache.push(value);
        }
    }
}

impl World {
    fn new() -> Self {
        Self {
            links: DependencyGraph::new(),
            accounts: Mutex::new(Vec::new()),
            users: Mutex::new(Vec::new()),
        }
    }

    fn account_id(&self, iter: usize) -> i64 {
        memoized(&self.links, "accounts", &self.accounts, iter, |next| 1000 + next as i64)
    }

    fn user_id(&self, iter: usize) -> i64 {
        memoized(&self.links, "users", &self.users, iter, |next| {
            self.links.record_reference("accounts");
            self.account_id(next) - 900
        })
    }

    /// Cross-model read, as a registry accessor performs it.
    fn referenced_user_id(&self, iter: usize) -> i64 {
        self.links.record_reference("users");
        self.user_id(iter)
    }
}

struct Users(Arc<World>);

impl RecordGenerator for Users {
    fn name(&self) -> &'static str {
        "users"
    }

    fn metadata(&self) -> Metadata {
        Metadata::new(2, &[])
    }

    fn generate(&self, iter: usize) -> Box<dyn Record> {
        Box::new(UserRecord { id: self.0.user_id(iter) })
    }
}

/// `orders` and `reviews` both read user ids.
struct Referrer {
    name: &'static str,
    world: Arc<World>,
}

impl RecordGenerator for Referrer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn metadata(&self) -> Metadata {
        Metadata::new(3, &[("env", "test")])
    }

    fn generate(&self, iter: usize) -> Box<dyn Record> {
        Box::new(OrderRecord {
            id: iter as i64,
            user_id: self.world.referenced_user_id(iter % 2),
        })
    }
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("datagen-runtime-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn run(
    links: &DependencyGraph,
    generator: &dyn RecordGenerator,
) -> Vec<Box<dyn Record>> {
    links.start_generation(generator.name());
    let records = (0..generator.metadata().count)
        .map(|iter| generator.generate(iter))
        .collect();
    links.end_generation();
    records
}

#[test]
fn referenced_models_load_first_and_share_memoized_values() {
    let world = Arc::new(World::new());
    let orders = Referrer {
        name: "orders",
        world: Arc::clone(&world),
    };
    let reviews = Referrer {
        name: "reviews",
        world: Arc::clone(&world),
    };
    let users = Users(Arc::clone(&world));

    let order_records = run(&world.links, &orders);
    let review_records = run(&world.links, &reviews);
    let user_records = run(&world.links, &users);

    assert_eq!(world.links.load_order(), ["accounts", "users", "reviews", "orders"]);
    assert_eq!(world.links.clear_order(), ["orders", "reviews", "users", "accounts"]);

    let user_ids: Vec<Value> = user_records.iter().map(|r| r.to_json()["id"].clone()).collect();
    assert_eq!(user_ids, [Value::from(100), Value::from(101)]);
    for records in [&order_records, &review_records] {
        let referenced: Vec<Value> = records.iter().map(|r| r.to_json()["user_id"].clone()).collect();
        assert_eq!(referenced, [Value::from(100), Value::from(101), Value::from(100)]);
    }

    let dir = temp_dir();
    let path = write_records(Format::Csv, "orders", &order_records, dir.to_str().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(
        fs::read_to_string(path).unwrap(),
        "id,user_id\n0,100\n1,101\n2,100\n"
    );
}

#[test]
fn values_memoized_by_a_referrer_keep_their_own_dependencies() {
    let world = Arc::new(World::new());
    let orders = Referrer {
        name: "orders",
        world: Arc::clone(&world),
    };
    run(&world.links, &orders);

    let rendered = world.links.to_string();
    assert!(rendered.contains("\"orders\": [\"users\"]"), "{rendered}");
    assert!(rendered.contains("\"users\": [\"accounts\"]"), "{rendered}");
    assert_eq!(world.links.current_producer(), None);
}
