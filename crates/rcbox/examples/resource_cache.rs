//! A small connection pool: connections live in `SyncBox`es, a cache keeps
//! only weak handles, and `Deinit` closes each connection when its last
//! owner goes away.

use parking_lot::Mutex;
use rcbox::{Deinit, Options, SyncBox, WeakSyncHandle};
use std::collections::HashMap;
use std::thread;

#[derive(Debug, Deinit)]
struct Connection {
    #[deinit(skip)]
    host: String,
    #[deinit(skip)]
    id: u32,
    session: Session,
}

#[derive(Debug, Default)]
struct Session {
    open: bool,
}

impl Deinit for Session {
    fn deinit(&mut self) {
        if self.open {
            println!("  closing session");
            self.open = false;
        }
    }
}

fn on_destroy(conn: &mut Connection) {
    println!("  connection {} to {} destroyed", conn.id, conn.host);
}

#[derive(Default)]
struct Cache {
    entries: Mutex<HashMap<String, WeakSyncHandle<Connection>>>,
    next_id: Mutex<u32>,
}

impl Cache {
    fn connect(&self, host: &str) -> SyncBox<Connection> {
        let mut entries = self.entries.lock();
        if let Some(conn) = entries.get(host).and_then(WeakSyncHandle::upgrade) {
            println!("reusing connection {} to {host}", conn.id);
            return conn;
        }

        let mut next_id = self.next_id.lock();
        *next_id += 1;
        println!("opening connection {} to {host}", *next_id);
        let conn = SyncBox::with_options(
            Connection {
                host: host.to_owned(),
                id: *next_id,
                session: Session { open: true },
            },
            Options::new().auto_deinit().destroy_hook(on_destroy),
        );
        entries.insert(host.to_owned(), SyncBox::downgrade(&conn));
        conn
    }
}

fn main() {
    let cache = Cache::default();

    let first = cache.connect("db.internal");
    thread::scope(|s| {
        for _ in 0..3 {
            s.spawn(|| {
                let conn = cache.connect("db.internal");
                assert!(conn.session.open);
            });
        }
    });

    println!("{}", SyncBox::describe(&first));
    println!("dropping last owner");
    drop(first);

    let again = cache.connect("db.internal");
    println!("{again:?}");
}
