use std::{fmt::Debug, future::Future, time::Duration};

use chrono::Utc;
use log::*;
use pg_common::{time::truncate_to_millis, Secret};
use tokio::time::timeout;

use crate::{
    admission::{AdmissionController, AdmissionPolicy, DEFAULT_LOOKUP_TIMEOUT},
    db_types::{Merchant, MerchantId, Payment, PaymentId},
    pe_api::{
        errors::PaymentFlowError,
        ledger_api::LedgerApi,
        ledger_objects::SettlementStamp,
        payment_objects::{NewPaymentRequest, PaymentResult, SettlementCallback},
    },
    traits::{
        LedgerError,
        LedgerManagement,
        MerchantLookup,
        MerchantLookupError,
        SettlementError,
        SettlementRelay,
        SettlementRequest,
    },
};

pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CALLBACK_ATTEMPTS: usize = 3;

/// Tunables for [`PaymentFlowApi`].
#[derive(Debug, Clone, Copy)]
pub struct FlowOptions {
    pub admission_policy: AdmissionPolicy,
    /// Deadline for every call to the merchant service
    pub merchant_timeout: Duration,
    /// Deadline for relaying a charge to the settlement processor
    pub settlement_timeout: Duration,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            admission_policy: AdmissionPolicy::default(),
            merchant_timeout: DEFAULT_LOOKUP_TIMEOUT,
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
        }
    }
}

/// `PaymentFlowApi` runs the payment saga.
///
/// It has no state of its own. Payments live in the ledger `L`, merchants are looked up through `M` and charges are
/// relayed to the settlement processor through `S`.
pub struct PaymentFlowApi<L, M, S> {
    ledger: LedgerApi<L>,
    merchants: M,
    settlement: S,
    admission: AdmissionController<M>,
    options: FlowOptions,
}

impl<L, M, S> Debug for PaymentFlowApi<L, M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi ({:?})", self.options)
    }
}

impl<L, M, S> Clone for PaymentFlowApi<L, M, S>
where
    L: Clone,
    M: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            merchants: self.merchants.clone(),
            settlement: self.settlement.clone(),
            admission: self.admission.clone(),
            options: self.options,
        }
    }
}

impl<L, M: Clone, S> PaymentFlowApi<L, M, S> {
    pub fn new(ledger: L, merchants: M, settlement: S, options: FlowOptions) -> Self {
        let admission = AdmissionController::new(merchants.clone(), options.admission_policy, options.merchant_timeout);
        Self { ledger: LedgerApi::new(ledger), merchants, settlement, admission, options }
    }

    pub fn ledger(&self) -> &LedgerApi<L> {
        &self.ledger
    }

    pub fn admission(&self) -> &AdmissionController<M> {
        &self.admission
    }
}

impl<L, M, S> PaymentFlowApi<L, M, S>
where
    L: LedgerManagement,
    M: MerchantLookup,
    S: SettlementRelay,
{
    /// Checks a merchant's credentials and returns the merchant's profile.
    ///
    /// Unknown credentials and inactive merchants both fail with `AuthenticationFailed`. Problems talking to the
    /// merchant service are internal errors.
    pub async fn authenticate(&self, username: &str, password: &Secret<String>) -> Result<Merchant, PaymentFlowError> {
        let id = self
            .with_merchant_deadline(self.merchants.find_merchant(username, password))
            .await?
            .ok_or_else(|| {
                debug!("🪪️ No merchant matches the credentials for {username}");
                PaymentFlowError::AuthenticationFailed
            })?;
        let merchant = self.with_merchant_deadline(self.merchants.fetch_merchant(&id)).await?;
        if !merchant.active {
            info!("🪪️ Merchant {id} ({username}) tried to log in, but is not active");
            return Err(PaymentFlowError::AuthenticationFailed);
        }
        Ok(merchant)
    }

    /// Runs admission control for `merchant_id`. See [`AdmissionController::allow`].
    pub async fn admit(&self, merchant_id: &MerchantId) -> bool {
        self.admission.allow(merchant_id).await
    }

    /// Takes a new payment from `merchant` all the way to the settlement processor.
    ///
    /// 1. The payment is validated and stored in the ledger with status `Created`.
    /// 2. Admission control runs. If the merchant is over budget the payment stays in `Created` and `RateLimited` is
    ///    returned with the payment's id.
    /// 3. The charge is relayed to the settlement processor. If that fails for any reason, the payment is marked
    ///    `Fail` with whatever message the processor sent, and the result is returned as normal. Otherwise the payment
    ///    becomes `Pending` and carries the processor's reference.
    ///
    /// Once the payment is recorded, ledger failures are reported as `Incomplete` so that the caller still learns the
    /// payment's id.
    pub async fn create_payment(
        &self,
        merchant: &Merchant,
        request: NewPaymentRequest,
    ) -> Result<PaymentResult, PaymentFlowError> {
        let new_payment = request.into_new_payment(merchant.id);
        new_payment.validate_at(Utc::now())?;
        let id = self.ledger.create_payment(new_payment).await.map_err(internal)?;
        trace!("💳️ Payment {id} recorded for merchant {}", merchant.id);

        if !self.admission.allow(&merchant.id).await {
            info!("💳️ Payment {id} rejected. Merchant {} is over its rate budget", merchant.id);
            return Err(PaymentFlowError::RateLimited(id));
        }

        let payment = self.ledger.read_payment(&id).await.map_err(|e| incomplete(id, e))?;
        let request = SettlementRequest::for_payment(&payment, &merchant.name);
        let sent_at = truncate_to_millis(Utc::now());
        let outcome = match timeout(self.options.settlement_timeout, self.settlement.relay_payment(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SettlementError::Timeout),
        };
        let payment = match outcome {
            Ok(accepted) => {
                debug!("💳️ Payment {id} accepted for settlement as {}", accepted.reference);
                self.ledger.update_to_pending(payment, accepted.reference, sent_at, &accepted.message).await
            },
            Err(e) => {
                warn!("💳️ Payment {id} could not be relayed for settlement. {e}");
                self.ledger.update_to_fail(payment, SettlementStamp::Sent(sent_at), e.processor_message()).await
            },
        }
        .map_err(|e| incomplete(id, e))?;
        Ok(PaymentResult { id, status: payment.status, bank_message: payment.settlement_message })
    }

    /// Applies the settlement processor's final verdict to a payment.
    ///
    /// A payment that already has a final status can be told the same outcome again, and the callback is
    /// acknowledged without changing anything. A different outcome is refused with `InvalidTransition`.
    ///
    /// The ledger write only lands if the payment has not changed since it was read. If a concurrent callback got
    /// there first, the payment is read again and the checks are repeated against its new status.
    pub async fn process_settlement_callback(
        &self,
        callback: SettlementCallback,
    ) -> Result<Payment, PaymentFlowError> {
        let reference = callback.id;
        let target = callback.outcome();
        for _ in 0..MAX_CALLBACK_ATTEMPTS {
            let payment = self.ledger.read_payment_by_external_reference(&reference).await.map_err(|e| match e {
                LedgerError::UnknownReference(r) => PaymentFlowError::UnknownReference(r),
                e => internal(e),
            })?;
            let id = payment.id;
            if payment.status.is_terminal() && payment.status == target {
                info!("💳️ Duplicate {target} callback for payment {id} ({reference}). Nothing to do.");
                return Ok(payment);
            }
            if !payment.status.can_transition_to(target) {
                warn!("💳️ Callback for payment {id} ({reference}) wants {target}, but the payment is {}", payment.status);
                return Err(PaymentFlowError::InvalidTransition { id, from: payment.status, to: target });
            }
            let received_at = truncate_to_millis(Utc::now());
            let result = if callback.success {
                self.ledger.update_to_success(payment, received_at, &callback.message).await
            } else {
                self.ledger.update_to_fail(payment, SettlementStamp::Received(received_at), &callback.message).await
            };
            match result {
                Ok(payment) => {
                    info!("💳️ Payment {id} settled as {}", payment.status);
                    return Ok(payment);
                },
                Err(LedgerError::StatusChanged { actual, .. }) => {
                    debug!("💳️ Payment {id} became {actual} while the {target} callback was applied. Checking again.");
                },
                Err(e) => return Err(internal(e)),
            }
        }
        error!("💳️ Payment for settlement reference {reference} kept changing. Giving up on the {target} callback.");
        Err(PaymentFlowError::Internal(format!("Payment for settlement reference {reference} kept changing")))
    }

    /// Fetches a payment on behalf of a merchant. Merchants may only see their own payments.
    pub async fn fetch_payment_for_merchant(
        &self,
        id: &PaymentId,
        merchant_id: &MerchantId,
    ) -> Result<Payment, PaymentFlowError> {
        let payment = self.ledger.read_payment(id).await?;
        if !payment.is_owned_by(merchant_id) {
            warn!("💳️ Merchant {merchant_id} asked for payment {id}, which belongs to {}", payment.merchant_id);
            return Err(PaymentFlowError::Unauthorized);
        }
        Ok(payment)
    }

    async fn with_merchant_deadline<T>(
        &self,
        call: impl Future<Output = Result<T, MerchantLookupError>>,
    ) -> Result<T, PaymentFlowError> {
        match timeout(self.options.merchant_timeout, call).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(MerchantLookupError::MerchantNotFound(id))) => {
                debug!("🪪️ Merchant {id} vanished from the merchant service");
                Err(PaymentFlowError::AuthenticationFailed)
            },
            Ok(Err(e)) => {
                error!("🪪️ Merchant service error. {e}");
                Err(PaymentFlowError::Internal(e.to_string()))
            },
            Err(_) => {
                error!("🪪️ Merchant service did not respond within {:?}", self.options.merchant_timeout);
                Err(PaymentFlowError::Internal(MerchantLookupError::Timeout.to_string()))
            },
        }
    }
}

fn internal(e: LedgerError) -> PaymentFlowError {
    error!("💳️ Ledger failure. {e}");
    PaymentFlowError::Internal(e.to_string())
}

fn incomplete(id: PaymentId, e: LedgerError) -> PaymentFlowError {
    error!("💳️ Ledger failure after payment {id} was recorded. {e}");
    PaymentFlowError::Incomplete { id, reason: e.to_string() }
}
