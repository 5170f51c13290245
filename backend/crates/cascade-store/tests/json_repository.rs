use cascade_core::{simulate, Contribution, Participant, ReserveState};
use cascade_store::{
    AllocationRepository, AllocationStore, JsonFileRepository, MemoryRepository, StoreError,
};
use pretty_assertions::assert_eq;
use solana_pubkey::Pubkey;

fn simulated_store(n: usize) -> (Vec<Participant>, AllocationStore) {
    let people = Participant::enumerate((0..n).map(|_| Pubkey::new_unique()));
    let contributions: Vec<_> = people
        .iter()
        .map(|p| Contribution::new(*p, (p.ordinal as u64 + 1) * 1_000_000_000))
        .collect();
    let outcome = simulate(&mut ReserveState::launch(), &contributions).unwrap();

    let mut store = AllocationStore {
        address_lut: Some(Pubkey::new_unique().to_string()),
        mint: Some(Pubkey::new_unique().to_string()),
        mint_pk: Some("mint-secret".to_string()),
        ..Default::default()
    };
    store.record_allocations(&outcome.records);
    (people, store)
}

#[test]
fn missing_file_loads_as_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonFileRepository::new(dir.path().join("keyInfo.json"));

    assert_eq!(repo.load().unwrap(), AllocationStore::default());
}

#[test]
fn saved_records_are_read_back_for_batching() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonFileRepository::new(dir.path().join("keyInfo.json"));
    let (people, store) = simulated_store(4);

    repo.save(&store).unwrap();
    let loaded = repo.load().unwrap();

    assert_eq!(loaded.len(), 4);
    for participant in &people {
        let record = loaded.record_for(participant).unwrap();
        assert_eq!(record.contributed, (participant.ordinal as u64 + 1) * 1_000_000_000);
        assert!(record.granted > 0);
    }
}

#[test]
fn file_uses_the_external_key_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyInfo.json");
    let repo = JsonFileRepository::new(&path);
    let (people, store) = simulated_store(1);

    repo.save(&store).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert!(raw.get("addressLUT").is_some());
    assert!(raw.get("mintPk").is_some());
    let entry = &raw[people[0].key.to_string()];
    assert_eq!(entry["solAmount"], "1");
    assert_eq!(entry["tokenAmount"], "34612903225806");
    assert!(entry["percentSupply"].is_f64());
}

#[test]
fn clearing_keeps_reserved_keys() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonFileRepository::new(dir.path().join("keyInfo.json"));
    let (_, store) = simulated_store(6);
    repo.save(&store).unwrap();

    let cleared = repo.clear_participants().unwrap();

    assert!(cleared.is_empty());
    let reloaded = repo.load().unwrap();
    assert!(reloaded.is_empty());
    assert_eq!(reloaded.address_lut, store.address_lut);
    assert_eq!(reloaded.mint, store.mint);
    assert_eq!(reloaded.mint_pk, store.mint_pk);
}

#[test]
fn memory_repository_clears_the_same_way() {
    let (_, store) = simulated_store(3);
    let repo = MemoryRepository::new(store.clone());

    repo.clear_participants().unwrap();

    let after = repo.snapshot();
    assert!(after.is_empty());
    assert_eq!(after.address_lut, store.address_lut);
}

#[test]
fn memory_repository_saves_whole_stores_from_any_thread() {
    let stores: Vec<AllocationStore> = (1..=4).map(|n| simulated_store(n).1).collect();
    let repo = MemoryRepository::default();

    std::thread::scope(|scope| {
        for store in &stores {
            let repo = &repo;
            scope.spawn(move || repo.save(store).unwrap());
        }
    });

    // last writer wins, never a mix of two stores
    let after = repo.load().unwrap();
    assert!(stores.contains(&after));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyInfo.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = JsonFileRepository::new(&path).load().unwrap_err();
    assert!(matches!(err, StoreError::Malformed { .. }));
}
