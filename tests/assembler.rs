use kestrel::asm::parse_source;
use kestrel::encoder::encode;
use kestrel::listing::{parse_listing, write_listing};
use kestrel::{Instruction, SymbolTable};

fn assemble(src: &str) -> (SymbolTable, Vec<Instruction>) {
    let mut table = SymbolTable::new();
    let mut instructions = Vec::new();
    parse_source(src, &mut instructions, &mut table, true).expect("pass 1");
    parse_source(src, &mut instructions, &mut table, false).expect("pass 2");
    (table, instructions)
}

fn listing_of(src: &str) -> (SymbolTable, Vec<Instruction>, String) {
    let (table, instructions) = assemble(src);
    let mut out = Vec::new();
    write_listing(&mut out, &table, &instructions).expect("listing");
    let text = String::from_utf8(out).expect("utf8");
    (table, instructions, text)
}

#[test]
fn reloaded_listing_matches_the_encoder_output() {
    let src = "\
.data
nums: .word 1 2 3
.text
main: addi x5, x0, 7
      addi x6, x5, -3
loop: addi x5, x5, 1
      bne x5, x6, loop
      jal x1, main
      halt
";
    let (_, instructions, text) = listing_of(src);
    let code = parse_listing(&text).expect("reload");
    for (i, inst) in instructions.iter().enumerate() {
        let addr = 4 * i as u32;
        assert_eq!(
            code.get(&addr),
            Some(&encode(inst).expect("encode")),
            "mismatch at {addr:#x}"
        );
    }
}

#[test]
fn labels_address_the_next_instruction() {
    let src = "\
      addi x1, x0, 1
here:
      addi x2, x0, 2
there: addi x3, x0, 3
";
    let (table, _) = assemble(src);
    assert_eq!(table.lookup_label("here"), Some(4));
    assert_eq!(table.lookup_label("there"), Some(8));
}

#[test]
fn data_labels_follow_the_data_cursor() {
    let src = "\
.data
a: .word 1
b: .half 2 3
c: .byte 4
d: .asciiz \"ok\"
";
    let (table, _) = assemble(src);
    assert_eq!(table.lookup_label("a"), Some(0x1000_0000));
    assert_eq!(table.lookup_label("b"), Some(0x1000_0004));
    assert_eq!(table.lookup_label("c"), Some(0x1000_0008));
    assert_eq!(table.lookup_label("d"), Some(0x1000_0009));
}

#[test]
fn comma_and_whitespace_operands_are_equivalent() {
    let (_, a) = assemble("add x1, x2, x3\n");
    let (_, b) = assemble("add x1,x2,x3\n");
    let (_, c) = assemble("add x1 x2 x3\n");
    let wa = encode(&a[0]).unwrap();
    assert_eq!(wa, encode(&b[0]).unwrap());
    assert_eq!(wa, encode(&c[0]).unwrap());
}

#[test]
fn pseudo_forms_encode_like_their_base_forms() {
    let (_, pseudo) = assemble("nop\nmv x5, x6\nli x7, 9\n");
    let (_, base) = assemble("addi x0, x0, 0\naddi x5, x6, 0\naddi x7, x0, 9\n");
    for (p, b) in pseudo.iter().zip(&base) {
        assert_eq!(encode(p).unwrap(), encode(b).unwrap());
    }
}

#[test]
fn jump_pseudo_resolves_labels() {
    let (_, instructions) = assemble("j end\naddi x1, x0, 1\nend: halt\n");
    assert_eq!(instructions[0].opcode, "jal");
    assert_eq!(instructions[0].rd, "x0");
    assert_eq!(instructions[0].immediate, "8");
}

#[test]
fn forward_references_resolve() {
    let (_, instructions) = assemble("beq x0, x0, skip\naddi x1, x0, 1\nskip: halt\n");
    assert_eq!(instructions[0].immediate, "8");
}

#[test]
fn data_lines_come_first_and_carry_their_sizes() {
    let src = ".data\n.byte 1 2\n.word 3\n.text\nhalt\n";
    let (_, _, text) = listing_of(src);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "0x10000000 0x00000001 # Data");
    assert_eq!(lines[1], "0x10000001 0x00000002 # Data");
    assert_eq!(lines[2], "0x10000002 0x00000003 # Data");
    assert!(lines[3].starts_with("0x0 0x0000007f , halt # halt-"));
}

#[test]
fn instruction_lines_carry_source_and_fingerprint() {
    let (_, _, text) = listing_of("start: addi x5, x0, 7\n");
    assert_eq!(
        text.trim_end(),
        "0x0 0x00700293 , addi x5, x0, 7 # addi-000-0000000-x5-x0--7"
    );
}

#[test]
fn globl_and_text_directives_are_inert() {
    let (_, with) = assemble(".globl main\n.text\nmain: addi x1, x0, 1\n");
    let (_, without) = assemble("main: addi x1, x0, 1\n");
    assert_eq!(
        encode(&with[0]).unwrap(),
        encode(&without[0]).unwrap()
    );
}

#[test]
fn branch_truncation_drops_high_bits_quietly() {
    // 8192 exceeds the 13-bit branch field and truncates to 0
    let (_, a) = assemble("beq x0, x0, 8192\n");
    let (_, b) = assemble("beq x0, x0, 0\n");
    assert_eq!(encode(&a[0]).unwrap(), encode(&b[0]).unwrap());
}
