use std::time::Duration;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;

use ldr_api::models::{Booking, Customer, DateRange, PaymentStatus, SessionMetadata};
use ldr_api::pricing::{self, BagQuantities};
use ldr_api::services::receipts::render_receipt;
use ldr_api::stripe::webhook;
use ldr_api::booking_reference;

fn sample_booking() -> Booking {
    Booking {
        booking_reference: "LDR-7XKQ2MNP".to_string(),
        customer: Customer {
            name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: Some("+39 333 123 4567".to_string()),
        },
        schedule: DateRange {
            drop_off_date: "2024-03-10".to_string(),
            drop_off_time: Some("09:30".to_string()),
            pick_up_date: "2024-03-12".to_string(),
            pick_up_time: Some("18:00".to_string()),
        },
        quantities: BagQuantities::new(2, 0, 1),
        billable_days: 3,
        per_day_subtotal: dec!(17),
        total_price: dec!(51),
        payment_status: PaymentStatus::Paid,
        provider_session_id: "cs_test_a1b2c3".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
    }
}

// Benchmark for quoting a storage period across bag mixes
fn quote_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("quote");

    for (label, quantities) in [
        ("one_small", BagQuantities::new(1, 0, 0)),
        ("mixed", BagQuantities::new(2, 1, 1)),
        ("full_cart", BagQuantities::new(50, 50, 50)),
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(label),
            &quantities,
            |b, quantities| {
                b.iter(|| {
                    let quote = pricing::quote(
                        black_box("2024-03-10"),
                        black_box("2024-03-17"),
                        quantities,
                    );
                    black_box(quote)
                });
            },
        );
    }

    group.finish();
}

// Benchmark for the calendar-day counter on both input shapes
fn billable_days_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("billable_days");

    group.bench_function("plain_dates", |b| {
        b.iter(|| black_box(pricing::billable_days("2024-03-10", "2024-04-02")))
    });
    group.bench_function("rfc3339_dates", |b| {
        b.iter(|| {
            black_box(pricing::billable_days(
                "2024-03-10T09:30:00+01:00",
                "2024-04-02T18:00:00+02:00",
            ))
        })
    });

    group.finish();
}

// Benchmark for booking-reference generation
fn reference_generation_benchmark(c: &mut Criterion) {
    c.bench_function("reference_generation", |b| {
        b.iter(|| black_box(booking_reference::generate()))
    });
}

// Benchmark for the metadata map the provider session carries
fn metadata_roundtrip_benchmark(c: &mut Criterion) {
    let booking = sample_booking();
    let metadata = SessionMetadata {
        booking_reference: Some(booking.booking_reference.clone()),
        customer_name: booking.customer.name.clone(),
        customer_email: booking.customer.email.clone(),
        customer_phone: booking.customer.phone.clone(),
        schedule: booking.schedule.clone(),
        quantities: booking.quantities,
        billable_days: Some(booking.billable_days),
        per_day_subtotal: Some(booking.per_day_subtotal),
        total_price: Some(booking.total_price),
        site_url: Some("https://luggagedepositrome.com".to_string()),
    };

    c.bench_function("metadata_to_map", |b| {
        b.iter(|| black_box(metadata.to_map().unwrap()))
    });

    let map = metadata.to_map().unwrap();
    c.bench_function("metadata_from_map", |b| {
        b.iter(|| black_box(SessionMetadata::from_map(&map).unwrap()))
    });
}

// Benchmark for webhook signature generation and verification
fn webhook_signature_benchmark(c: &mut Criterion) {
    let payload = br#"{"id":"evt_test_0001","type":"checkout.session.completed","data":{"object":{"id":"cs_test_a1b2c3","payment_status":"paid"}}}"#;
    let secret = "whsec_bench_secret";
    let timestamp = 1_710_000_000;
    let header = webhook::header_value(secret, timestamp, payload);

    c.bench_function("webhook_sign", |b| {
        b.iter(|| black_box(webhook::sign(secret, timestamp, payload)))
    });
    c.bench_function("webhook_verify", |b| {
        b.iter(|| {
            webhook::verify_at(black_box(&header), payload, secret, 300, timestamp)
                .expect("signature should verify")
        })
    });
}

// Benchmark for receipt rendering
fn receipt_rendering_benchmark(c: &mut Criterion) {
    let booking = sample_booking();

    c.bench_function("render_receipt", |b| {
        b.iter(|| black_box(render_receipt(&booking)))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets =
        quote_benchmark,
        billable_days_benchmark,
        reference_generation_benchmark,
        metadata_roundtrip_benchmark,
        webhook_signature_benchmark,
        receipt_rendering_benchmark
}

criterion_main!(benches);
