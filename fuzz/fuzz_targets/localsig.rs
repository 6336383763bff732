#![no_main]

use dotdelta::{
    metadata::{
        signatures::{decode_local_signature, TypeTokenDecoder},
        token::Token,
    },
    symbols::types::{ExternalType, TypeRef},
    Result,
};
use libfuzzer_sys::fuzz_target;

/// Resolves every token to an external class named after its value.
struct AnyToken;

impl TypeTokenDecoder for AnyToken {
    fn decode_type_token(&self, token: Token) -> Result<TypeRef> {
        Ok(TypeRef::External(ExternalType::class(
            "Fuzz",
            "Fuzz",
            &format!("T{:08x}", token.value()),
        )))
    }
}

fuzz_target!(|data: &[u8]| {
    let _ = decode_local_signature(data, &AnyToken);
});
