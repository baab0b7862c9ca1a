//! Single-transfer submission with local admission control.

use crate::chain::{Account, ChainClient, TransferRequest};
use crate::error::DispatchError;
use crate::gas;
use ethers::types::{Address, TxHash, U256};
use tracing::{debug, info};

/// Reject the transfer when its gas fee exceeds `balance`.
///
/// Returns the fee on success. A fee that overflows 256 bits is never admissible.
pub fn check_admission(
    from: Address,
    to: Address,
    gas_units: U256,
    gas_price: U256,
    balance: U256,
) -> Result<U256, DispatchError> {
    match gas::total_cost(gas_units, gas_price) {
        Some(total_cost) if total_cost <= balance => Ok(total_cost),
        total_cost => Err(DispatchError::InsufficientBalance {
            from,
            to,
            total_cost: total_cost.unwrap_or(U256::MAX),
            balance,
        }),
    }
}

/// Estimate, admit, sign and broadcast one transfer.
///
/// Returns once the node acknowledges the transaction; confirmation is tracked
/// separately. The balance check is advisory since the balance can move between
/// the check and the broadcast.
pub async fn submit(
    client: &dyn ChainClient,
    account: &Account,
    to: Address,
    value: U256,
    gas_price: U256,
    available_balance: U256,
) -> Result<TxHash, DispatchError> {
    let from = account.address;
    let request = TransferRequest::new(from, to, value);

    let gas_units = client
        .estimate_gas(&request)
        .await
        .map_err(|e| DispatchError::chain(from, Some(to), e))?;

    let total_cost = check_admission(from, to, gas_units, gas_price, available_balance)?;
    debug!(
        "Admitted transfer {:?} -> {:?}: gas {} x {} wei = {} wei (balance {} wei)",
        from, to, gas_units, gas_price, total_cost, available_balance
    );

    let request = request.with_gas(gas_units, gas_price);
    let payload = client
        .sign(account, &request)
        .await
        .map_err(|e| DispatchError::chain(from, Some(to), e))?;

    let tx_hash = client
        .send_signed(payload)
        .await
        .map_err(|e| DispatchError::chain(from, Some(to), e))?;

    info!("Transaction sent: {:?} ({:?} -> {:?})", tx_hash, from, to);
    Ok(tx_hash)
}
