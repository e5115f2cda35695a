mod common;

use barbell::{
    domain::{
        BankTransferStatus, CheckoutRequest, CreateRefundRequest, MemberRole, PaymentStatus,
        PaymentType, ReviewDecision,
    },
    error::AppError,
    service::{ReceiptUpload, SubmitBankTransfer},
};
use common::*;

const ROUNDS: usize = 10;

/// Exactly one side of a race succeeds; the other must see a conflict.
fn assert_one_winner<T: std::fmt::Debug>(results: Vec<Result<T, AppError>>) {
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!((wins, conflicts), (1, results.len() - 1), "{:?}", results);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_refund_approvals_apply_once() -> anyhow::Result<()> {
    let t = setup_on_file(8).await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let admin = create_member(&t.pool, "admin@example.com", MemberRole::Admin).await?;

    for _ in 0..ROUNDS {
        let payment = completed_payment(&t.pool, member.id, 1000).await?;
        let request = t
            .ctx
            .refund_service
            .submit(
                member.id,
                CreateRefundRequest {
                    payment_id: payment.id,
                    requested_cents: 400,
                    notes: None,
                },
            )
            .await?;
        let (request_id, admin_id) = (request.id, admin.id);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let refunds = t.ctx.refund_service.clone();
                tokio::spawn(async move {
                    refunds
                        .approve(request_id, admin_id, ReviewDecision::default())
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await?);
        }
        assert_one_winner(results);

        let after = find_payment(&t.pool, payment.id).await?;
        assert_eq!(after.refunded_cents, 400);
        assert_eq!(after.status, PaymentStatus::Completed);
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bank_transfer_reviews_decide_once() -> anyhow::Result<()> {
    let t = setup_on_file(8).await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let admin = create_member(&t.pool, "admin@example.com", MemberRole::Admin).await?;

    for _ in 0..ROUNDS {
        let membership = create_pending_membership(&t.pool, member.id, 750000).await?;
        let transfer = t
            .ctx
            .bank_transfer_service
            .submit(
                member.id,
                SubmitBankTransfer {
                    membership_id: membership.id,
                    amount_cents: 750000,
                    currency: None,
                    notes: None,
                },
                Some(ReceiptUpload {
                    filename: "slip.jpg".to_string(),
                    data: b"\xff\xd8\xff\xe0receipt".to_vec(),
                }),
            )
            .await?;
        let (transfer_id, admin_id) = (transfer.id, admin.id);

        let approve = {
            let service = t.ctx.bank_transfer_service.clone();
            tokio::spawn(async move {
                service
                    .approve(transfer_id, admin_id, ReviewDecision::default())
                    .await
            })
        };
        let decline = {
            let service = t.ctx.bank_transfer_service.clone();
            tokio::spawn(async move {
                service
                    .decline(transfer_id, admin_id, ReviewDecision::default())
                    .await
            })
        };

        let results = vec![approve.await?, decline.await?];
        let winner = results
            .iter()
            .find_map(|r| r.as_ref().ok())
            .map(|transfer| transfer.status);
        assert_one_winner(results);

        // The linked payment follows whichever decision won
        let payment = find_payment(&t.pool, transfer.payment_id).await?;
        match winner {
            Some(BankTransferStatus::Approved) => assert_eq!(payment.status, PaymentStatus::Completed),
            Some(BankTransferStatus::Declined) => assert_eq!(payment.status, PaymentStatus::Failed),
            other => panic!("unexpected review outcome {:?}", other),
        }
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_checkouts_open_one_membership_payment() -> anyhow::Result<()> {
    let t = setup_on_file(8).await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;
    let (member_id, membership_id) = (member.id, membership.id);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let payments = t.ctx.payment_service.clone();
            tokio::spawn(async move {
                payments
                    .initiate_checkout(
                        member_id,
                        CheckoutRequest {
                            amount_cents: 750000,
                            currency: None,
                            payment_type: PaymentType::Membership,
                            related_id: Some(membership_id),
                            description: None,
                            customer: customer(),
                        },
                    )
                    .await
                    .map(|session| session.payment.id)
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await?);
    }
    assert_one_winner(results);

    Ok(())
}
