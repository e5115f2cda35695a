mod common;

use barbell::{
    domain::{
        BankTransferStatus, MemberRole, MembershipStatus, PaymentMethod, PaymentStatus,
        PaymentType, ReviewDecision,
    },
    error::AppError,
    service::{ReceiptUpload, SubmitBankTransfer},
};
use common::*;

fn receipt() -> Option<ReceiptUpload> {
    Some(ReceiptUpload {
        filename: "slip.png".to_string(),
        data: b"\x89PNG\r\n\x1a\nnot-really-a-png".to_vec(),
    })
}

fn transfer_for(membership_id: uuid::Uuid, amount_cents: i64) -> SubmitBankTransfer {
    SubmitBankTransfer {
        membership_id,
        amount_cents,
        currency: None,
        notes: Some("Paid from Sampath Bank".to_string()),
    }
}

#[tokio::test]
async fn submission_stores_receipt_and_pending_payment() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;

    let transfer = t
        .ctx
        .bank_transfer_service
        .submit(member.id, transfer_for(membership.id, 750000), receipt())
        .await?;

    assert_eq!(transfer.status, BankTransferStatus::Pending);
    assert!(transfer.receipt_url.starts_with("uploads/receipts/"));
    let on_disk = t
        .uploads_dir
        .join(transfer.receipt_url.trim_start_matches("uploads/"));
    assert!(on_disk.exists());

    let payment = find_payment(&t.pool, transfer.payment_id).await?;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.payment_method, PaymentMethod::BankTransfer);
    assert_eq!(payment.payment_type, PaymentType::Membership);
    assert_eq!(payment.related_id, Some(membership.id));
    assert_eq!(payment.amount_cents, 750000);

    Ok(())
}

#[tokio::test]
async fn missing_receipt_creates_nothing() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;

    let empty = Some(ReceiptUpload {
        filename: "slip.png".to_string(),
        data: Vec::new(),
    });

    for receipt in [None, empty] {
        let result = t
            .ctx
            .bank_transfer_service
            .submit(member.id, transfer_for(membership.id, 750000), receipt)
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(ref m)) if m == "No file uploaded"));
    }

    let (transfers,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bank_transfers")
        .fetch_one(&t.pool)
        .await?;
    let (payments,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(transfers, 0);
    assert_eq!(payments, 0);

    Ok(())
}

#[tokio::test]
async fn approval_completes_payment_and_activates_membership() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let admin = create_member(&t.pool, "admin@example.com", MemberRole::Admin).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;
    let service = &t.ctx.bank_transfer_service;

    let transfer = service
        .submit(member.id, transfer_for(membership.id, 750000), receipt())
        .await?;

    let approved = service
        .approve(
            transfer.id,
            admin.id,
            ReviewDecision {
                admin_notes: Some("Matched bank statement".to_string()),
            },
        )
        .await?;

    assert_eq!(approved.status, BankTransferStatus::Approved);
    assert_eq!(approved.processed_by, Some(admin.id));
    assert!(approved.processed_at.is_some());
    assert_eq!(approved.admin_notes.as_deref(), Some("Matched bank statement"));

    let payment = find_payment(&t.pool, transfer.payment_id).await?;
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.paid_at.is_some());

    let membership = find_membership(&t.pool, membership.id).await?;
    assert_eq!(membership.status, MembershipStatus::Active);
    assert!(membership.starts_at.is_some());

    let sent = t.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Bank transfer approved");
    assert!(sent[0].body.contains("Matched bank statement"));

    // Second decision on the same record is rejected
    let again = service.approve(transfer.id, admin.id, ReviewDecision::default()).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    let flip = service.decline(transfer.id, admin.id, ReviewDecision::default()).await;
    assert!(matches!(flip, Err(AppError::Conflict(_))));
    assert_eq!(t.mailer.sent().len(), 1);

    Ok(())
}

#[tokio::test]
async fn decline_fails_payment_and_leaves_membership_pending() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let admin = create_member(&t.pool, "admin@example.com", MemberRole::Admin).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;
    let service = &t.ctx.bank_transfer_service;

    let transfer = service
        .submit(member.id, transfer_for(membership.id, 750000), receipt())
        .await?;
    let declined = service
        .decline(transfer.id, admin.id, ReviewDecision::default())
        .await?;

    assert_eq!(declined.status, BankTransferStatus::Declined);
    assert_eq!(
        find_payment(&t.pool, transfer.payment_id).await?.status,
        PaymentStatus::Failed
    );
    assert_eq!(
        find_membership(&t.pool, membership.id).await?.status,
        MembershipStatus::PendingPayment
    );
    assert_eq!(t.mailer.subjects(), vec!["Bank transfer declined".to_string()]);

    let again = service.decline(transfer.id, admin.id, ReviewDecision::default()).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn unknown_transfer_is_not_found() -> anyhow::Result<()> {
    let t = setup().await?;
    let admin = create_member(&t.pool, "admin@example.com", MemberRole::Admin).await?;

    let result = t
        .ctx
        .bank_transfer_service
        .approve(uuid::Uuid::new_v4(), admin.id, ReviewDecision::default())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn rejects_non_image_receipts_before_writing() -> anyhow::Result<()> {
    let t = setup().await?;
    let member = create_member(&t.pool, "member@example.com", MemberRole::Member).await?;
    let membership = create_pending_membership(&t.pool, member.id, 750000).await?;

    let pdf = Some(ReceiptUpload {
        filename: "slip.pdf".to_string(),
        data: b"%PDF-1.4".to_vec(),
    });
    let result = t
        .ctx
        .bank_transfer_service
        .submit(member.id, transfer_for(membership.id, 750000), pdf)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(!t.uploads_dir.join("receipts").exists());

    Ok(())
}
