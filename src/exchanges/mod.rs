pub mod coinbase_pro;
