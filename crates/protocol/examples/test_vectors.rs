//! Print signed datagram test vectors for client implementations.
//!
//! Run with: cargo run --package protocol --example test_vectors

use protocol::{Authenticator, SharedSecret};

fn main() {
    let secret = SharedSecret::new("s3cr3t").expect("non-empty secret");
    let auth = Authenticator::new(secret, 60).expect("non-zero skew");

    // Test vector 1: suspend, no arguments
    print_test_vector(
        "suspend",
        &auth.encode_signed::<&str>(1_700_000_000, "abc123", "suspend", &[]),
    );

    // Test vector 2: mixed-case command name
    print_test_vector(
        "reboot_mixed_case",
        &auth.encode_signed::<&str>(1_700_000_030, "n-2", "ReBoot", &[]),
    );

    // Test vector 3: command with arguments
    print_test_vector(
        "test_with_args",
        &auth.encode_signed(1_700_000_060, "n-3", "test", &["alpha", "beta gamma"]),
    );

    // Test vector 4: empty argument field
    print_test_vector(
        "test_empty_arg",
        &auth.encode_signed(1_700_000_090, "n-4", "test", &[""]),
    );
}

fn print_test_vector(name: &str, datagram: &str) {
    println!("secret=s3cr3t name={} datagram={}", name, datagram);
}
