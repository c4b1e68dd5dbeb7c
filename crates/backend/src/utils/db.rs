use alloy_primitives::{Address, Bytes};
use eyre::{eyre, Result};
use revm::{db::CacheDB, primitives::Bytecode, DatabaseRef};

/// Returns the code resident at `addr`, empty if the account does not exist.
pub fn get_code<T>(db: &T, addr: Address) -> Result<Bytes>
where
    T: DatabaseRef,
    T::Error: std::error::Error,
{
    let Some(info) = db
        .basic_ref(addr)
        .map_err(|e| eyre!(format!("failed to load account ({}): {}", addr, e)))?
    else {
        return Ok(Bytes::new());
    };

    if let Some(ref bytecode) = info.code {
        Ok(bytecode.original_bytes())
    } else {
        let code_hash = info.code_hash();
        db.code_by_hash_ref(code_hash).map(|code| code.original_bytes()).map_err(|e| {
            eyre!(format!("the code hash ({}) does not exist: {}", code_hash, e))
        })
    }
}

/// Installs `code` at `addr`, keeping the account's balance, nonce and storage.
pub fn set_code<T>(db: &mut CacheDB<T>, addr: Address, code: Bytes) -> Result<()>
where
    T: DatabaseRef,
    T::Error: std::error::Error,
{
    let mut info = db
        .basic_ref(addr)
        .map_err(|e| eyre!(format!("failed to load account ({}): {}", addr, e)))?
        .unwrap_or_default();

    let bytecode = Bytecode::new_raw(code);
    info.code_hash = bytecode.hash_slow();
    info.code = Some(bytecode);
    db.insert_account_info(addr, info);

    Ok(())
}
