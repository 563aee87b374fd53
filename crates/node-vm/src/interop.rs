//! Syscall (interop) dispatch. Each syscall is identified on the wire by a
//! 4-byte hash of its ASCII name (`System.Runtime.CheckWitness`, etc); the
//! engine looks the hash up in a per-host dispatch table built from
//! [`InteropHost`], which the surrounding runtime implements to bridge into
//! chain state, the native contracts, and the event bus.

use node_types::UInt160;

use crate::errors::VmError;
use crate::gas::InteropPriceTable;
use crate::stack_item::StackItem;

/// Restricts which interop calls a frame may make, mirroring the signer
/// witness scopes: a read-only call context (e.g. RPC simulation) can be
/// granted `READ_ONLY` to forbid `Storage.Put`/`Delete` and `Notify`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallFlags(pub u8);

impl CallFlags {
    pub const NONE: CallFlags = CallFlags(0);
    pub const READ_STATES: CallFlags = CallFlags(0b0001);
    pub const WRITE_STATES: CallFlags = CallFlags(0b0010);
    pub const ALLOW_CALL: CallFlags = CallFlags(0b0100);
    pub const ALLOW_NOTIFY: CallFlags = CallFlags(0b1000);
    pub const ALL: CallFlags = CallFlags(0b1111);

    pub fn has(self, required: CallFlags) -> bool {
        self.0 & required.0 == required.0
    }
}

/// One step of a `Storage.Find` iterator session. Sessions are keyed by a
/// host-assigned id and expire after an idle timeout enforced by the host,
/// not the engine.
pub struct FindOptions {
    pub keys_only: bool,
    pub values_only: bool,
    pub remove_prefix: bool,
}

/// Bridges the VM into the surrounding node: storage, witness checking, and
/// the notification event bus. Implemented once by the runtime crate and
/// threaded through every `ExecutionEngine`.
pub trait InteropHost {
    fn check_witness(&self, account: &UInt160) -> bool;
    fn current_script_hash(&self) -> UInt160;
    fn calling_script_hash(&self) -> Option<UInt160>;
    fn block_height(&self) -> u32;
    fn block_timestamp(&self) -> u64;

    fn storage_get(&self, contract: &UInt160, key: &[u8]) -> Option<Vec<u8>>;
    fn storage_put(&mut self, contract: &UInt160, key: &[u8], value: &[u8]);
    fn storage_delete(&mut self, contract: &UInt160, key: &[u8]);
    fn storage_find(&self, contract: &UInt160, prefix: &[u8], opts: &FindOptions) -> Vec<(Vec<u8>, Vec<u8>)>;

    fn notify(&mut self, contract: &UInt160, event_name: &str, state: Vec<StackItem>);
}

/// Resolves a 4-byte interop hash into a call, charging gas and checking
/// `flags` before invoking the host. Returns the pushed result items, if
/// any.
pub fn dispatch(
    hash: u32,
    flags: CallFlags,
    args: Vec<StackItem>,
    host: &mut dyn InteropHost,
) -> Result<(Option<StackItem>, i64), VmError> {
    let price = InteropPriceTable::price_for(hash).ok_or(VmError::UnknownSyscall(hash))?;
    let result = match hash {
        // System.Runtime.CheckWitness
        0x0c7f_f2c3 => {
            require(flags, CallFlags::READ_STATES)?;
            let account = account_arg(&args, 0)?;
            Some(StackItem::Boolean(host.check_witness(&account)))
        }
        // System.Runtime.Notify
        0x95d2_0a5d => {
            require(flags, CallFlags::ALLOW_NOTIFY)?;
            let name = match args.first() {
                Some(StackItem::ByteString(b)) => String::from_utf8_lossy(b).into_owned(),
                _ => return Err(VmError::InvalidCast { from: "?", to: "event name" }),
            };
            let state = args.into_iter().skip(1).collect();
            host.notify(&host.current_script_hash(), &name, state);
            None
        }
        // System.Storage.Get
        0x9bf6_67ce => {
            require(flags, CallFlags::READ_STATES)?;
            let key = args.first().ok_or(VmError::StackUnderflow { needed: 1, available: 0 })?.as_bytes()?;
            match host.storage_get(&host.current_script_hash(), &key) {
                Some(v) => Some(StackItem::byte_string(v)),
                None => Some(StackItem::Null),
            }
        }
        // System.Storage.Put
        0xe63f_1884 => {
            require(flags, CallFlags::WRITE_STATES)?;
            let key = args.first().ok_or(VmError::StackUnderflow { needed: 2, available: args.len() })?.as_bytes()?;
            let value = args.get(1).ok_or(VmError::StackUnderflow { needed: 2, available: args.len() })?.as_bytes()?;
            let contract = host.current_script_hash();
            host.storage_put(&contract, &key, &value);
            None
        }
        // System.Storage.Delete
        0x6c5e_1d1e => {
            require(flags, CallFlags::WRITE_STATES)?;
            let key = args.first().ok_or(VmError::StackUnderflow { needed: 1, available: 0 })?.as_bytes()?;
            let contract = host.current_script_hash();
            host.storage_delete(&contract, &key);
            None
        }
        // System.Contract.Call — dispatched by the engine's CALL handling,
        // not here; reaching this arm means the caller routed incorrectly.
        0x627d_5b52 => return Err(VmError::UnknownSyscall(hash)),
        _ => return Err(VmError::UnknownSyscall(hash)),
    };
    Ok((result, price))
}

fn require(flags: CallFlags, required: CallFlags) -> Result<(), VmError> {
    if flags.has(required) {
        Ok(())
    } else {
        Err(VmError::CallFlagViolation("missing required call flag"))
    }
}

fn account_arg(args: &[StackItem], index: usize) -> Result<UInt160, VmError> {
    let bytes = args
        .get(index)
        .ok_or(VmError::StackUnderflow { needed: index + 1, available: args.len() })?
        .as_bytes()?;
    UInt160::from_bytes(&bytes).map_err(|_| VmError::InvalidCast { from: "ByteString", to: "UInt160" })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHost;
    impl InteropHost for NullHost {
        fn check_witness(&self, _account: &UInt160) -> bool {
            true
        }
        fn current_script_hash(&self) -> UInt160 {
            UInt160::from_bytes(&[0u8; 20]).unwrap()
        }
        fn calling_script_hash(&self) -> Option<UInt160> {
            None
        }
        fn block_height(&self) -> u32 {
            0
        }
        fn block_timestamp(&self) -> u64 {
            0
        }
        fn storage_get(&self, _c: &UInt160, _k: &[u8]) -> Option<Vec<u8>> {
            None
        }
        fn storage_put(&mut self, _c: &UInt160, _k: &[u8], _v: &[u8]) {}
        fn storage_delete(&mut self, _c: &UInt160, _k: &[u8]) {}
        fn storage_find(&self, _c: &UInt160, _p: &[u8], _o: &FindOptions) -> Vec<(Vec<u8>, Vec<u8>)> {
            Vec::new()
        }
        fn notify(&mut self, _c: &UInt160, _n: &str, _s: Vec<StackItem>) {}
    }

    #[test]
    fn check_witness_requires_read_states_flag() {
        let mut host = NullHost;
        let args = vec![StackItem::byte_string(vec![0u8; 20])];
        let err = dispatch(0x0c7f_f2c3, CallFlags::NONE, args, &mut host);
        assert!(matches!(err, Err(VmError::CallFlagViolation(_))));
    }

    #[test]
    fn check_witness_succeeds_with_flag() {
        let mut host = NullHost;
        let args = vec![StackItem::byte_string(vec![0u8; 20])];
        let (result, price) = dispatch(0x0c7f_f2c3, CallFlags::READ_STATES, args, &mut host).unwrap();
        assert!(matches!(result, Some(StackItem::Boolean(true))));
        assert!(price > 0);
    }

    #[test]
    fn unknown_hash_rejected() {
        let mut host = NullHost;
        assert!(matches!(dispatch(0xffff_ffff, CallFlags::ALL, vec![], &mut host), Err(VmError::UnknownSyscall(_))));
    }
}
