use std::fs;
use std::time::{Duration, SystemTime};

use linemark::config::MarkConfig;
use linemark::models::*;
use linemark::storage::*;
use linemark::workspace::Workspace;
use linemark::Error;
use speculate2::speculate;
use tempfile::TempDir;

fn sample_tree() -> MarkTree {
    let mut tree = MarkTree::with_root();
    let root = tree.root();
    let a = tree.create(Mark::leaf("A", "first", "a.ts", 3));
    let mut g = Mark::group("G");
    g.set_expansion(Expansion::Collapsed);
    let g = tree.create(g);
    let b = tree.create(Mark::leaf("B", "", "b.ts", 9));
    tree.add_child(root, a);
    tree.add_child(root, g);
    tree.add_child(g, b);
    tree
}

fn touch_later(path: &std::path::Path) {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to open save file");
    file.set_modified(SystemTime::now() + Duration::from_secs(10))
        .expect("Failed to set mtime");
}

speculate! {
    before {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let workspace = Workspace::single(dir.path());
        let config = MarkConfig::default();
    }

    describe "resolve_save_path" {
        it "derives the path under the single workspace root" {
            let resolved = resolve_save_path(&config, &workspace).expect("Failed to resolve");
            assert_eq!(resolved.path, dir.path().join(".vscode").join("markData.json"));
            assert!(resolved.derived);
        }

        it "fails without exactly one workspace root" {
            let none = resolve_save_path(&config, &Workspace::default());
            assert!(matches!(none, Err(Error::ProjectPathUnavailable { roots: 0 })));

            let two = Workspace::new(vec![dir.path().join("a"), dir.path().join("b")]);
            let result = resolve_save_path(&config, &two);
            assert!(matches!(result, Err(Error::ProjectPathUnavailable { roots: 2 })));
        }

        it "appends the default file name to a configured directory" {
            let config = MarkConfig {
                data_save_file_path: Some(dir.path().display().to_string()),
                ..MarkConfig::default()
            };
            let resolved = resolve_save_path(&config, &Workspace::default()).expect("Failed to resolve");
            assert_eq!(resolved.path, dir.path().join(DEFAULT_FILE_NAME));
            assert!(!resolved.derived);
        }

        it "uses a configured file as is" {
            let file = dir.path().join("custom.json");
            fs::write(&file, "").expect("Failed to write");
            let config = MarkConfig {
                data_save_file_path: Some(file.display().to_string()),
                ..MarkConfig::default()
            };
            let resolved = resolve_save_path(&config, &workspace).expect("Failed to resolve");
            assert_eq!(resolved.path, file);
        }

        it "rejects a configured path that does not exist" {
            let missing = dir.path().join("nope").join("marks.json");
            let config = MarkConfig {
                data_save_file_path: Some(missing.display().to_string()),
                ..MarkConfig::default()
            };
            let result = resolve_save_path(&config, &workspace);
            assert!(matches!(result, Err(Error::PathInvalid(p)) if p == missing));
        }

        it "treats a blank configured path as unset" {
            let config = MarkConfig {
                data_save_file_path: Some("  ".to_string()),
                ..MarkConfig::default()
            };
            let resolved = resolve_save_path(&config, &workspace).expect("Failed to resolve");
            assert!(resolved.derived);
        }
    }

    describe "MarkStore::open" {
        it "creates the placeholder file once" {
            let store = MarkStore::open(&config, &workspace).expect("Failed to open");
            assert!(store.path().is_file());
            assert_eq!(fs::read_to_string(store.path()).expect("read"), "");

            store.save(&sample_tree()).expect("Failed to save");
            MarkStore::open(&config, &workspace).expect("Failed to reopen");
            assert!(!fs::read_to_string(store.path()).expect("read").is_empty());
        }

        it "loads an empty placeholder as no tree" {
            let store = MarkStore::open(&config, &workspace).expect("Failed to open");
            assert!(store.load().expect("Failed to load").is_none());
        }
    }

    describe "save and load" {
        it "round-trips to a deep-equal tree" {
            let tree = sample_tree();
            let store = MarkStore::open(&config, &workspace).expect("Failed to open");
            store.save(&tree).expect("Failed to save");

            let loaded = store.load().expect("Failed to load").expect("tree present");
            assert!(tree.subtree_eq(tree.root(), &loaded, loaded.root()));
        }

        it "records the written timestamp as known" {
            let store = MarkStore::open(&config, &workspace).expect("Failed to open");
            store.save(&sample_tree()).expect("Failed to save");

            assert_eq!(store.last_known(), store.disk_modified().expect("stat"));
            assert!(!store.changed_on_disk().expect("stat"));
        }

        it "writes camelCase fields and no parent link" {
            let store = MarkStore::open(&config, &workspace).expect("Failed to open");
            store.save(&sample_tree()).expect("Failed to save");
            let text = fs::read_to_string(store.path()).expect("read");

            assert!(text.contains("\"filePath\": \"a.ts\""));
            assert!(text.contains("\"expansionState\": \"collapsed\""));
            assert!(text.contains("\"kind\": \"leaf\""));
            assert!(!text.contains("parent"));
        }

        it "reports a missing import file" {
            let result = read_tree(&dir.path().join("missing.json"));
            assert!(matches!(result, Err(Error::PathNotFound(_))));
        }
    }

    describe "changed_on_disk" {
        it "notices a newer file written by someone else" {
            let store = MarkStore::open(&config, &workspace).expect("Failed to open");
            store.save(&sample_tree()).expect("Failed to save");
            touch_later(store.path());

            assert!(store.changed_on_disk().expect("stat"));
            store.acknowledge(store.disk_modified().expect("stat"));
            assert!(!store.changed_on_disk().expect("stat"));
        }

        it "is false when the file is missing" {
            let store = MarkStore::at(dir.path().join("absent.json"));
            assert!(!store.changed_on_disk().expect("stat"));
        }
    }

    describe "save_detached" {
        it "writes inline outside a runtime" {
            let store = MarkStore::open(&config, &workspace).expect("Failed to open");
            let tree = sample_tree();
            store
                .save_detached(&tree, |e| panic!("save failed: {}", e))
                .expect("Failed to snapshot");

            let loaded = read_tree(store.path()).expect("read").expect("tree present");
            assert!(tree.subtree_eq(tree.root(), &loaded, loaded.root()));
        }

        it "reports write failures to the callback" {
            let store = MarkStore::at(dir.path().join("no-such-dir").join("marks.json"));
            let failed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            let flag = failed.clone();
            store
                .save_detached(&sample_tree(), move |_| {
                    flag.store(true, std::sync::atomic::Ordering::SeqCst)
                })
                .expect("Failed to snapshot");
            assert!(failed.load(std::sync::atomic::Ordering::SeqCst));
        }
    }
}
