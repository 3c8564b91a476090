#[cfg(test)]
mod tests {
    use crate::clock::FixedClock;
    use crate::commands::incised::{
        create_incised, create_incisor, create_master_product, delete_incised, IncisedInput,
        IncisorInput, MasterProductInput,
    };
    use crate::commands::kasbon::{
        apply_fifo_deduction, create_kasbon, delete_payment, list_payments,
        record_manual_payment, DeductionSource, KasbonInput, ManualPaymentInput,
    };
    use crate::commands::payroll::{
        create_employee, delete_payroll, save_payrolls, update_payroll, EmployeeInput,
        PayrollEntry, SavePayrollInput, UpdatePayrollInput,
    };
    use crate::commands::period::PeriodQuery;
    use crate::commands::settlement::{bulk_settle, settle};
    use crate::commands::warehouse::{
        delete_outgoing_stock, save_outgoing_stock, stock_summary, OutgoingStockInput,
    };
    use crate::db::{self, DbPool, Incised, KasbonOwner, KasbonPaymentStatus, PayrollStatus};
    use chrono::NaiveDateTime;
    use crate::error::KebunError;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static FIXTURE_SEQ: AtomicU32 = AtomicU32::new(0);

    async fn setup_test_db() -> Option<DbPool> {
        dotenvy::dotenv().ok();
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping database test");
            return None;
        };
        let pool = db::init_pool(&database_url, 5)
            .await
            .expect("Failed to create pool");
        db::init_database(&pool)
            .await
            .expect("Failed to run migrations");
        Some(pool)
    }

    fn unique(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!(
            "{}-{}-{}",
            prefix,
            nanos % 1_000_000_000_000,
            FIXTURE_SEQ.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock::at(day(20), 10, 0)
    }

    fn tapping(no_invoice: &str, product: &str, location: &str, qty: i64, amount: i64) -> IncisedInput {
        IncisedInput {
            product: product.to_string(),
            date: day(20),
            no_invoice: no_invoice.to_string(),
            lok_kebun: location.to_string(),
            j_brg: "Karet".to_string(),
            desk: None,
            qty_kg: Decimal::from(qty),
            price_qty: Decimal::from(10_000),
            amount: Some(Decimal::from(amount)),
            split: None,
            keping: 2,
            kualitas: "A".to_string(),
        }
    }

    async fn incisor(pool: &DbPool) -> (i32, String) {
        let inv = unique("INV");
        let row = create_incisor(
            pool,
            IncisorInput {
                no_invoice: inv.clone(),
                name: unique("Penoreh"),
                is_active: None,
            },
        )
        .await
        .expect("create incisor");
        (row.id, inv)
    }

    async fn kasbon(pool: &DbPool, owner: KasbonOwner, amount: i64, date: NaiveDate) -> i32 {
        create_kasbon(
            pool,
            KasbonInput {
                owner,
                amount: Decimal::from(amount),
                transaction_date: Some(date),
                reason: None,
                status: None,
            },
            &clock(),
        )
        .await
        .expect("create kasbon")
        .id
    }

    async fn kasbon_status(pool: &DbPool, id: i32) -> KasbonPaymentStatus {
        sqlx::query_scalar("SELECT payment_status FROM kasbons WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("kasbon status")
    }

    async fn paid_total(pool: &DbPool, kasbon_id: i32) -> Decimal {
        list_payments(pool, kasbon_id)
            .await
            .expect("payments")
            .iter()
            .map(|p| p.amount)
            .sum()
    }

    async fn cleanup_incisor(pool: &DbPool, incisor_id: i32, no_invoice: &str) {
        let _ = sqlx::query(
            "DELETE FROM kasbon_payments WHERE kasbon_id IN (SELECT id FROM kasbons WHERE incisor_id = $1)",
        )
        .bind(incisor_id)
        .execute(pool)
        .await;
        let _ = sqlx::query(
            "DELETE FROM financial_transactions WHERE incised_id IN (SELECT id FROM inciseds WHERE no_invoice = $1)",
        )
        .bind(no_invoice)
        .execute(pool)
        .await;
        let _ = sqlx::query("DELETE FROM inciseds WHERE no_invoice = $1")
            .bind(no_invoice)
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM kasbons WHERE incisor_id = $1")
            .bind(incisor_id)
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM incisors WHERE id = $1")
            .bind(incisor_id)
            .execute(pool)
            .await;
    }

    async fn cleanup_product(pool: &DbPool, product_id: i32) {
        let _ = sqlx::query("DELETE FROM incoming_stocks WHERE product_id = $1")
            .bind(product_id)
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM master_products WHERE id = $1")
            .bind(product_id)
            .execute(pool)
            .await;
    }

    async fn kasbon_state(pool: &DbPool, id: i32) -> (KasbonPaymentStatus, Option<NaiveDateTime>) {
        sqlx::query_as("SELECT payment_status, paid_at FROM kasbons WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("kasbon state")
    }

    async fn employee(pool: &DbPool, salary: i64) -> i32 {
        create_employee(
            pool,
            EmployeeInput {
                employee_code: unique("EMP"),
                name: unique("Pegawai"),
                position: None,
                salary: Decimal::from(salary),
                is_active: Some(false),
            },
        )
        .await
        .expect("create employee")
        .id
    }

    async fn cleanup_employee(pool: &DbPool, employee_id: i32) {
        let _ = sqlx::query(
            "DELETE FROM kasbon_payments WHERE kasbon_id IN (SELECT id FROM kasbons WHERE employee_id = $1)",
        )
        .bind(employee_id)
        .execute(pool)
        .await;
        let _ = sqlx::query("DELETE FROM kasbons WHERE employee_id = $1")
            .bind(employee_id)
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM payrolls WHERE employee_id = $1")
            .bind(employee_id)
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(employee_id)
            .execute(pool)
            .await;
    }

    #[tokio::test]
    async fn test_settle_pays_oldest_kasbon_first() {
        let Some(pool) = setup_test_db().await else { return };
        let (incisor_id, inv) = incisor(&pool).await;
        let owner = KasbonOwner::Incisor(incisor_id);

        let k1 = kasbon(&pool, owner, 100, day(3)).await;
        let k3 = kasbon(&pool, owner, 100, day(9)).await;
        let k2 = kasbon(&pool, owner, 100, day(6)).await;

        let product = unique("Lump");
        let row = create_incised(&pool, tapping(&inv, &product, "Temadu", 1, 150))
            .await
            .expect("create incised");

        let outcome = settle(&pool, row.id, &clock()).await.expect("settle");
        assert_eq!(outcome.gross, Decimal::from(150));
        assert_eq!(outcome.deducted, Decimal::from(150));
        assert_eq!(outcome.net, Decimal::ZERO);
        // product is not in the catalog
        assert!(outcome.warehouse.receipts.is_empty());
        assert_eq!(outcome.warehouse.unmatched.len(), 1);

        assert_eq!(paid_total(&pool, k1).await, Decimal::from(100));
        assert_eq!(paid_total(&pool, k2).await, Decimal::from(50));
        assert_eq!(paid_total(&pool, k3).await, Decimal::ZERO);
        assert_eq!(kasbon_status(&pool, k1).await, KasbonPaymentStatus::Paid);
        assert_eq!(kasbon_status(&pool, k2).await, KasbonPaymentStatus::Partial);
        assert_eq!(kasbon_status(&pool, k3).await, KasbonPaymentStatus::Unpaid);

        let settled: Incised = sqlx::query_as("SELECT * FROM inciseds WHERE id = $1")
            .bind(row.id)
            .fetch_one(&pool)
            .await
            .expect("reload incised");
        assert_eq!(settled.net_received, Decimal::ZERO);
        assert_eq!(
            settled.total_deduction + settled.net_received,
            settled.amount
        );
        assert_eq!(settled.paid_at, Some(clock().0));

        // Nothing left over, so no payout line
        let payouts: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM financial_transactions WHERE incised_id = $1",
        )
        .bind(row.id)
        .fetch_one(&pool)
        .await
        .expect("count payouts");
        assert_eq!(payouts, 0);

        cleanup_incisor(&pool, incisor_id, &inv).await;
    }

    #[tokio::test]
    async fn test_settle_twice_is_rejected_without_side_effects() {
        let Some(pool) = setup_test_db().await else { return };
        let (incisor_id, inv) = incisor(&pool).await;
        let k = kasbon(&pool, KasbonOwner::Incisor(incisor_id), 40_000, day(2)).await;

        let row = create_incised(&pool, tapping(&inv, &unique("Lump"), "Sebayar A", 10, 100_000))
            .await
            .expect("create incised");

        let first = settle(&pool, row.id, &clock()).await.expect("first settle");
        assert_eq!(first.deducted, Decimal::from(40_000));
        assert_eq!(first.net, Decimal::from(60_000));

        let payout: (Decimal, String) = sqlx::query_as(
            "SELECT amount, category FROM financial_transactions WHERE incised_id = $1",
        )
        .bind(row.id)
        .fetch_one(&pool)
        .await
        .expect("payout line");
        assert_eq!(payout.0, Decimal::from(60_000));
        assert_eq!(payout.1, "Incisor Payment");

        let second = settle(&pool, row.id, &clock()).await;
        assert!(matches!(second, Err(KebunError::AlreadySettled(_))));

        let payment_count = list_payments(&pool, k).await.expect("payments").len();
        assert_eq!(payment_count, 1);
        let payouts: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM financial_transactions WHERE incised_id = $1",
        )
        .bind(row.id)
        .fetch_one(&pool)
        .await
        .expect("count payouts");
        assert_eq!(payouts, 1);

        // Paid rows are frozen
        assert!(matches!(
            delete_incised(&pool, row.id).await,
            Err(KebunError::Business(_))
        ));

        cleanup_incisor(&pool, incisor_id, &inv).await;
    }

    #[tokio::test]
    async fn test_bulk_settle_creates_one_receipt_per_group() {
        let Some(pool) = setup_test_db().await else { return };
        let (incisor_id, inv) = incisor(&pool).await;
        let product = create_master_product(
            &pool,
            MasterProductInput {
                name: unique("Karet Lump"),
                code: None,
            },
        )
        .await
        .expect("create product");

        let mut ids = Vec::new();
        for (location, qty, amount) in [
            ("Temadu", 10, 100_000),
            ("Agro Sebayar", 4, 40_000),
            ("Temadu", 20, 190_000),
            ("Agro Sebayar", 6, 62_000),
            ("Temadu", 30, 290_000),
        ] {
            let row = create_incised(&pool, tapping(&inv, &product.name, location, qty, amount))
                .await
                .expect("create incised");
            ids.push(row.id);
        }
        // An id that does not exist is skipped, not fatal
        ids.push(i32::MAX);

        let outcome = bulk_settle(&pool, &ids, &clock()).await.expect("bulk settle");
        assert_eq!(outcome.settled_ids.len(), 5);
        assert_eq!(outcome.skipped_ids, vec![i32::MAX]);
        assert_eq!(outcome.total_gross, Decimal::from(682_000));
        assert!(outcome.warehouse.unmatched.is_empty());

        let receipts = &outcome.warehouse.receipts;
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].qty_net, Decimal::from(60));
        assert_eq!(receipts[0].total_amount, Decimal::from(580_000));
        assert_eq!(
            receipts[0].price_per_kg,
            (Decimal::from(580_000) / Decimal::from(60)).round_dp(2)
        );
        assert_eq!(receipts[0].keping, 6);
        assert_eq!(receipts[0].kualitas.as_deref(), Some("A (Batch Auto)"));
        assert!(receipts[0].no_po.starts_with("PBK.I-TMD-"));
        assert!(receipts[0].no_po.ends_with("/25"));
        assert_eq!(receipts[1].qty_net, Decimal::from(10));
        assert!(receipts[1].no_po.starts_with("PBK.I-AGR-"));
        assert_ne!(receipts[0].no_po, receipts[1].no_po);

        // Re-running the batch settles nothing and receives nothing
        let again = bulk_settle(&pool, &ids, &clock()).await.expect("second bulk");
        assert!(again.settled_ids.is_empty());
        assert!(again.warehouse.receipts.is_empty());

        cleanup_product(&pool, product.id).await;
        cleanup_incisor(&pool, incisor_id, &inv).await;
    }

    #[tokio::test]
    async fn test_delete_payroll_reverses_only_its_payments() {
        let Some(pool) = setup_test_db().await else { return };
        let employee = create_employee(
            &pool,
            EmployeeInput {
                employee_code: unique("EMP"),
                name: unique("Pegawai"),
                position: None,
                salary: Decimal::from(3_000_000),
                is_active: Some(false),
            },
        )
        .await
        .expect("create employee");
        let owner = KasbonOwner::Employee(employee.id);

        let older = kasbon(&pool, owner, 300, day(1)).await;
        let newer = kasbon(&pool, owner, 200, day(5)).await;
        record_manual_payment(
            &pool,
            newer,
            ManualPaymentInput {
                amount: Decimal::from(50),
                payment_date: None,
                notes: Some("cash repayment".into()),
            },
            &clock(),
        )
        .await
        .expect("manual payment");

        let period = "2025-01".to_string();
        let saved = save_payrolls(
            &pool,
            SavePayrollInput {
                period: period.clone(),
                meal_allowance_daily: Decimal::from(20_000),
                entries: vec![PayrollEntry {
                    employee_id: employee.id,
                    base_salary: Decimal::from(3_000_000),
                    days_present: 26,
                    incentive: Decimal::ZERO,
                    kasbon_deduction: Decimal::from(300),
                }],
            },
            &clock(),
        )
        .await
        .expect("save payroll");
        let payroll_id = saved[0].id;

        assert_eq!(kasbon_status(&pool, older).await, KasbonPaymentStatus::Paid);
        let tagged = list_payments(&pool, older).await.expect("payments");
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].payroll_id, Some(payroll_id));
        assert!(tagged[0]
            .notes
            .as_deref()
            .unwrap_or_default()
            .contains(&format!("Payroll ID: #{}", payroll_id)));

        // Deducting more than is owed is refused
        let too_much = save_payrolls(
            &pool,
            SavePayrollInput {
                period: "2039-12".into(),
                meal_allowance_daily: Decimal::ZERO,
                entries: vec![PayrollEntry {
                    employee_id: employee.id,
                    base_salary: Decimal::from(3_000_000),
                    days_present: 0,
                    incentive: Decimal::ZERO,
                    kasbon_deduction: Decimal::from(1_000),
                }],
            },
            &clock(),
        )
        .await;
        assert!(matches!(too_much, Err(KebunError::Validation(_))));

        let reversed = delete_payroll(&pool, payroll_id, &clock())
            .await
            .expect("delete payroll");
        assert_eq!(reversed, vec![older]);

        assert_eq!(kasbon_status(&pool, older).await, KasbonPaymentStatus::Unpaid);
        assert_eq!(paid_total(&pool, older).await, Decimal::ZERO);
        assert_eq!(kasbon_status(&pool, newer).await, KasbonPaymentStatus::Partial);
        assert_eq!(paid_total(&pool, newer).await, Decimal::from(50));

        cleanup_employee(&pool, employee.id).await;
    }

    #[tokio::test]
    async fn test_update_payroll_reverses_then_reapplies_deduction() {
        let Some(pool) = setup_test_db().await else { return };
        let employee_id = employee(&pool, 1_000).await;
        let owner = KasbonOwner::Employee(employee_id);
        let k1 = kasbon(&pool, owner, 300, day(1)).await;
        let k2 = kasbon(&pool, owner, 200, day(4)).await;

        let saved = save_payrolls(
            &pool,
            SavePayrollInput {
                period: "2025-01".into(),
                meal_allowance_daily: Decimal::from(20),
                entries: vec![PayrollEntry {
                    employee_id,
                    base_salary: Decimal::from(1_000),
                    days_present: 1,
                    incentive: Decimal::ZERO,
                    kasbon_deduction: Decimal::from(400),
                }],
            },
            &clock(),
        )
        .await
        .expect("save payroll");
        let payroll_id = saved[0].id;
        assert_eq!(kasbon_state(&pool, k1).await, (KasbonPaymentStatus::Paid, Some(clock().0)));
        assert_eq!(kasbon_state(&pool, k2).await.0, KasbonPaymentStatus::Partial);

        // Engine-made payments are not removable by hand
        let made_by_payroll = list_payments(&pool, k1).await.expect("payments")[0].id;
        assert!(matches!(
            delete_payment(&pool, made_by_payroll, &clock()).await,
            Err(KebunError::Business(_))
        ));

        let input = |status, deduction: i64| UpdatePayrollInput {
            status,
            base_salary: Decimal::from(1_000),
            days_present: 1,
            meal_allowance_daily: Decimal::from(20),
            incentive: Decimal::ZERO,
            kasbon_deduction: Decimal::from(deduction),
        };

        let draft = update_payroll(&pool, payroll_id, input(PayrollStatus::Draft, 100), &clock())
            .await
            .expect("update to draft");
        assert_eq!(draft.status, PayrollStatus::Draft);
        assert_eq!(draft.net_salary, Decimal::from(920));
        assert_eq!(draft.payment_date, None);
        assert_eq!(kasbon_state(&pool, k1).await, (KasbonPaymentStatus::Partial, None));
        assert_eq!(paid_total(&pool, k1).await, Decimal::from(100));
        assert_eq!(kasbon_state(&pool, k2).await, (KasbonPaymentStatus::Unpaid, None));
        assert_eq!(paid_total(&pool, k2).await, Decimal::ZERO);

        let items: Vec<String> = sqlx::query_scalar(
            "SELECT description FROM payroll_items WHERE payroll_id = $1 ORDER BY id",
        )
        .bind(payroll_id)
        .fetch_all(&pool)
        .await
        .expect("items");
        assert_eq!(
            items,
            vec!["Base Salary", "Meal Allowance (1 days)", "Kasbon Deduction"]
        );

        let paid = update_payroll(&pool, payroll_id, input(PayrollStatus::Paid, 0), &clock())
            .await
            .expect("update to paid");
        assert_eq!(paid.status, PayrollStatus::Paid);
        assert_eq!(paid.payment_date, Some(clock().0));
        assert_eq!(paid.net_salary, Decimal::from(1_020));
        assert_eq!(kasbon_state(&pool, k1).await, (KasbonPaymentStatus::Unpaid, None));
        assert_eq!(paid_total(&pool, k1).await, Decimal::ZERO);

        // Still bounded by what is owed after the reversal
        assert!(matches!(
            update_payroll(&pool, payroll_id, input(PayrollStatus::Final, 501), &clock()).await,
            Err(KebunError::Validation(_))
        ));

        cleanup_employee(&pool, employee_id).await;
    }

    #[tokio::test]
    async fn test_deleting_manual_payment_restores_status() {
        let Some(pool) = setup_test_db().await else { return };
        let employee_id = employee(&pool, 2_000_000).await;
        let k = kasbon(&pool, KasbonOwner::Employee(employee_id), 200, day(2)).await;

        let payment = record_manual_payment(
            &pool,
            k,
            ManualPaymentInput {
                amount: Decimal::from(200),
                payment_date: None,
                notes: None,
            },
            &clock(),
        )
        .await
        .expect("manual payment");
        assert_eq!(kasbon_state(&pool, k).await, (KasbonPaymentStatus::Paid, Some(clock().0)));

        let over = record_manual_payment(
            &pool,
            k,
            ManualPaymentInput {
                amount: Decimal::from(1),
                payment_date: None,
                notes: None,
            },
            &clock(),
        )
        .await;
        assert!(matches!(over, Err(KebunError::Validation(_))));

        delete_payment(&pool, payment.id, &clock())
            .await
            .expect("delete payment");
        assert_eq!(kasbon_state(&pool, k).await, (KasbonPaymentStatus::Unpaid, None));
        assert!(matches!(
            delete_payment(&pool, payment.id, &clock()).await,
            Err(KebunError::NotFound(_))
        ));

        cleanup_employee(&pool, employee_id).await;
    }

    #[tokio::test]
    async fn test_stale_open_kasbon_is_marked_paid_during_deduction() {
        let Some(pool) = setup_test_db().await else { return };
        let (incisor_id, inv) = incisor(&pool).await;
        let owner = KasbonOwner::Incisor(incisor_id);
        let k = kasbon(&pool, owner, 100, day(2)).await;

        record_manual_payment(
            &pool,
            k,
            ManualPaymentInput {
                amount: Decimal::from(100),
                payment_date: None,
                notes: None,
            },
            &clock(),
        )
        .await
        .expect("manual payment");
        sqlx::query("UPDATE kasbons SET payment_status = 'unpaid', paid_at = NULL WHERE id = $1")
            .bind(k)
            .execute(&pool)
            .await
            .expect("force stale flag");

        let mut tx = pool.begin().await.expect("begin");
        let plan = apply_fifo_deduction(
            &mut *tx,
            owner,
            Decimal::from(50),
            DeductionSource::Settlement {
                incised_id: 0,
                tapping_date: day(20),
            },
            &clock(),
        )
        .await
        .expect("deduction");
        tx.commit().await.expect("commit");

        assert_eq!(plan.repaired, vec![k]);
        assert!(plan.allocations.is_empty());
        assert_eq!(plan.deducted, Decimal::ZERO);
        assert_eq!(plan.remaining, Decimal::from(50));
        assert_eq!(kasbon_state(&pool, k).await, (KasbonPaymentStatus::Paid, Some(clock().0)));
        assert_eq!(list_payments(&pool, k).await.expect("payments").len(), 1);

        cleanup_incisor(&pool, incisor_id, &inv).await;
    }

    #[tokio::test]
    async fn test_outgoing_stock_feeds_summary_and_checks_ids() {
        let Some(pool) = setup_test_db().await else { return };
        let product = create_master_product(
            &pool,
            MasterProductInput {
                name: unique("Karet Slab"),
                code: None,
            },
        )
        .await
        .expect("create product");

        let date = NaiveDate::from_ymd_opt(2091, 3, 15).unwrap();
        let period = PeriodQuery {
            time_period: Some("specific-month".into()),
            month: Some(3),
            year: Some(2091),
            ..PeriodQuery::default()
        };
        let before = stock_summary(&pool, &period, &clock()).await.expect("summary");

        let dispatch = |product_id: i32, qty_sampai: Option<i64>, status: &str| OutgoingStockInput {
            id: None,
            product_id,
            customer_name: Some("PT Buyer".into()),
            no_invoice: None,
            no_po: None,
            date,
            qty_out: Decimal::from(1_000),
            keping_out: None,
            qty_sampai: qty_sampai.map(Decimal::from),
            status: Some(status.to_string()),
            selling_price: Decimal::from(15_000),
            pph_value: None,
            ob_cost: None,
            extra_cost: None,
            grand_total: Decimal::from(14_700_000),
            notes: None,
        };

        let sold = save_outgoing_stock(&pool, dispatch(product.id, Some(980), "buyer"))
            .await
            .expect("save sold");
        let pending = save_outgoing_stock(&pool, dispatch(product.id, None, "draft"))
            .await
            .expect("save draft");

        let after = stock_summary(&pool, &period, &clock()).await.expect("summary");
        assert_eq!(after.chart_year, 2091);
        assert_eq!(after.sales.shipments - before.sales.shipments, 1);
        assert_eq!(after.sales.revenue - before.sales.revenue, Decimal::from(14_700_000));
        assert_eq!(after.sales.sold_kg - before.sales.sold_kg, Decimal::from(980));
        assert_eq!(after.sales.shrinkage_kg - before.sales.shrinkage_kg, Decimal::from(20));
        assert_eq!(
            after.monthly[2].sales_kg - before.monthly[2].sales_kg,
            Decimal::from(1_000)
        );

        assert!(matches!(
            save_outgoing_stock(&pool, dispatch(i32::MAX, None, "buyer")).await,
            Err(KebunError::NotFound(_))
        ));

        delete_outgoing_stock(&pool, sold).await.expect("delete sold");
        delete_outgoing_stock(&pool, pending).await.expect("delete draft");
        assert!(matches!(
            delete_outgoing_stock(&pool, sold).await,
            Err(KebunError::NotFound(_))
        ));

        cleanup_product(&pool, product.id).await;
    }
}
