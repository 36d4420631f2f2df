#![no_main]

use libfuzzer_sys::fuzz_target;
use regjs::lexer::{Lexer, TokenKind};
use regjs::string_dict::StringDict;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if source.len() > 100_000 {
        return;
    }

    let mut dict = StringDict::new();
    let mut lexer = Lexer::new(source, &mut dict);

    // Every input ends in Eof, never a panic
    loop {
        let token = lexer.next_token();
        if matches!(token.kind, TokenKind::Eof) {
            break;
        }
    }
});
