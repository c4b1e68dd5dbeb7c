pub mod abi;
pub mod db;
pub mod evm;
