//! Terminal walkthrough of the charge lifecycle.
//!
//! Takes a static QRIS payload, mints a charge link for an amount, resolves
//! the link the way the payer's page does, and prints the dynamic payload a
//! QR renderer would encode.
//!
//! Run with:
//!   cargo run --example demo -- [amount] [note]

use chrono::Utc;

use qris_protocol::tlv;
use qris_protocol::{
    format_idr, verify_checksum, Amount, ChargeRecord, DynamicPayloadBuilder, TokenCodec,
};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";

const TEMPLATE: &str = "00020101021126660014ID.CO.QRIS.WWW01189360091500000000010215ID10200000000010303UMI5204581253033605802ID5917WARUNG KOPI SENJA6008SEMARANG61055024163041304";

fn step(n: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}[{n}] {title}{RESET}");
}

fn main() {
    let mut args = std::env::args().skip(1);
    let value: f64 = args
        .next()
        .and_then(|a| a.parse().ok())
        .unwrap_or(75000.0);
    let note = args.next().unwrap_or_else(|| "Kopi susu".to_string());

    step(1, "Static template");
    let builder = DynamicPayloadBuilder::new(TEMPLATE).expect("demo template is valid");
    for field in builder.template() {
        println!("  {DIM}{}{RESET}  {}", field.tag(), field.value());
    }

    step(2, "Mint charge link");
    let amount = Amount::new(value).expect("amount must be positive");
    let record = ChargeRecord::new(amount)
        .with_note(note)
        .with_created_at(Utc::now());
    let codec = TokenCodec::default();
    let token = codec.encode(&record);
    println!("  amount : {}", format_idr(amount));
    println!("  link   : {GREEN}https://example.invalid/c/{token}{RESET}");

    step(3, "Resolve link");
    let resolved = codec.decode(&token).expect("freshly minted token decodes");
    println!("  amount : {}", format_idr(resolved.amount));
    println!("  note   : {}", resolved.note.as_deref().unwrap_or("-"));

    step(4, "Dynamic payload");
    let dynamic = builder.build(resolved.amount);
    println!("  {dynamic}");
    println!(
        "  fields : {}, checksum valid: {}",
        tlv::parse(&dynamic).map(|p| p.len()).unwrap_or(0),
        verify_checksum(&dynamic)
    );
}
