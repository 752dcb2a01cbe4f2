use criterion::{BatchSize, Criterion};
use iotconnect::storage::provision::{Platform, RecordStore, RecordType, SLOT_SIZE};
use iotconnect::storage::{ReadStorage, Storage, error::Error};

#[derive(Clone)]
struct RamSlot {
    memory: [u8; SLOT_SIZE],
}

impl ReadStorage for RamSlot {
    type Error = Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        bytes.copy_from_slice(self.memory.get(start..end).ok_or(Error::OutOfBounds)?);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SLOT_SIZE
    }
}

impl Storage for RamSlot {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        self.memory
            .get_mut(start..end)
            .ok_or(Error::OutOfBounds)?
            .copy_from_slice(bytes);
        Ok(())
    }
}

fn provisioned() -> RamSlot {
    let mut store = RecordStore::new(RamSlot {
        memory: [0xFF; SLOT_SIZE],
    });
    store.init().unwrap();
    store.set(RecordType::Cpid, "ACME").unwrap();
    store.set(RecordType::Env, "prod").unwrap();
    store.set(RecordType::Duid, "dev1").unwrap();
    store.set_platform(Platform::Aws).unwrap();
    store.commit().unwrap();
    store.into_inner()
}

pub fn bench_init_provisioned(c: &mut Criterion) {
    let slot = provisioned();
    c.bench_function("record_store_init", |b| {
        b.iter_batched(
            || RecordStore::new(slot.clone()),
            |mut store| store.init().unwrap(),
            BatchSize::SmallInput,
        )
    });
}

pub fn bench_set_and_commit(c: &mut Criterion) {
    let slot = provisioned();
    c.bench_function("record_store_set_commit", |b| {
        b.iter_batched_ref(
            || {
                let mut store = RecordStore::new(slot.clone());
                store.init().unwrap();
                store
            },
            |store| {
                store.set(RecordType::Duid, "device-0042").unwrap();
                store.commit().unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}
