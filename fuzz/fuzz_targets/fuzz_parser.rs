#![no_main]

use libfuzzer_sys::fuzz_target;
use regjs::parser::Parser;
use regjs::string_dict::StringDict;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if source.len() > 100_000 {
        return;
    }

    let mut dict = StringDict::new();
    let mut parser = Parser::new(source, &mut dict);
    let _ = parser.parse_program();
});
