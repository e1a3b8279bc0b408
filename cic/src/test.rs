use matches::assert_matches;

use cifile::{Image, ReadImageExt, WriteImageExt};
use civm::constants::TEXT_MAGIC;
use civm::Opcode::{self, *};
use civm::{opcode_word, ExitCode, Machine, Word};

use super::*;
use crate::compiler::Compiler;
use crate::symbol::Class;

fn w(op: Opcode) -> Word {
    opcode_word(op)
}

fn build(source: &str) -> Image {
    compile(source).unwrap()
}

fn run_image(image: &Image) -> (ExitCode, String) {
    let mut machine = Machine::with_output(
        image.text(),
        image.data(),
        image.main_offset(),
        Vec::new(),
    );
    let code = machine.run(&[]);
    (code, String::from_utf8(machine.into_output()).unwrap())
}

fn run(source: &str) -> ExitCode {
    run_image(&build(source)).0
}

#[test]
fn trivial_main_exits_zero() {
    assert_eq!(run("int main(){ return 0; }"), ExitCode::Exit(0));
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(run("int main(){ return 2+3*4; }"), ExitCode::Exit(14));
    assert_eq!(run("int main(){ return 2*3+4; }"), ExitCode::Exit(10));
}

#[test]
fn while_loop_counts_to_ten() {
    let source = "int main(){ int i; i=0; while(i<10) i=i+1; return i; }";
    assert_eq!(run(source), ExitCode::Exit(10));
}

#[test]
fn global_variable_lives_in_a_data_cell() {
    let image = build("int a; int main(){ a=7; return a; }");

    assert_eq!(image.data().len(), 4);
    assert_eq!(run_image(&image).0, ExitCode::Exit(7));
}

#[test]
fn printf_writes_through_the_host_bridge() {
    let (code, out) = run_image(&build("int main(){ printf(\"hi\\n\"); return 0; }"));

    assert_eq!(code, ExitCode::Exit(0));
    assert!(out.starts_with("hi\n"));
}

#[test]
fn enum_constants_count_from_initializers() {
    let source = "enum { A=5, B, C=10 }; int main(){ return A+B+C; }";
    assert_eq!(run(source), ExitCode::Exit(21));
}

#[test]
fn function_calls_pass_arguments() {
    let source = "int f(int x){ return x*x; } int main(){ return f(6)+f(1); }";
    assert_eq!(run(source), ExitCode::Exit(37));
}

#[test]
fn malloc_buffer_is_indexable() {
    let source = "int main(){ int* p; p=malloc(16); p[0]=123; return p[0]; }";
    assert_eq!(run(source), ExitCode::Exit(123));
}

#[test]
fn recursion_keeps_frames_separate() {
    let source = "int fib(int n){ if (n < 2) return n; return fib(n-1) + fib(n-2); }\n\
                  int main(){ return fib(10); }";
    assert_eq!(run(source), ExitCode::Exit(55));
}

#[test]
fn trivial_body_compiles_to_enter_leave() {
    let image = build("int main(){ return 3; }");

    assert_eq!(
        image.text(),
        [TEXT_MAGIC, w(ENT), 0, w(IMM), 3, w(LEV)]
    );
    assert_eq!(image.main_offset(), 1);
}

#[test]
fn empty_body_still_gets_a_leave() {
    let image = build("int main(){ }");

    assert_eq!(image.text(), [TEXT_MAGIC, w(ENT), 0, w(LEV)]);
}

#[test]
fn return_at_body_end_emits_no_second_leave() {
    let image = build("int f(){ return 1; } int main(){ return f(); }");

    let leaves = image
        .text()
        .iter()
        .enumerate()
        .filter(|(_, word)| **word == w(LEV))
        .count();
    // one per function, none doubled
    assert_eq!(leaves, 2);
}

#[test]
fn while_emits_relative_back_edge() {
    let image = build("int main(){ while (1) ; return 0; }");

    assert_eq!(
        image.text(),
        [
            TEXT_MAGIC,
            w(ENT),
            0,
            w(IMM),
            1,
            w(BZ),
            3,
            w(JMP),
            -5,
            w(IMM),
            0,
            w(LEV)
        ]
    );
}

#[test]
fn if_else_patches_both_holes() {
    let image = build("int main(){ if (0) return 1; else return 2; }");

    assert_eq!(
        image.text(),
        [
            TEXT_MAGIC,
            w(ENT),
            0,
            w(IMM),
            0,
            w(BZ),
            6,
            w(IMM),
            1,
            w(LEV),
            w(JMP),
            4,
            w(IMM),
            2,
            w(LEV)
        ]
    );
    assert_eq!(run_image(&image).0, ExitCode::Exit(2));
}

#[test]
fn every_branch_operand_lands_inside_the_text() {
    let source = "int main(){ int i; i=0;\n\
                  if (i) { while (i<5) i = i ? i+1 : 1; } else i = 2;\n\
                  return i ? i : 7; }";
    let image = build(source);
    let text = image.text();

    let mut at = 1;
    while at < text.len() {
        let op = num::FromPrimitive::from_i32(text[at]).unwrap();
        match op {
            JMP | BZ | BNZ => {
                let slot = at + 1;
                let target = slot as i32 + text[slot];
                assert!(target >= 1 && target <= text.len() as i32);
            }
            _ => {}
        }
        at += if Opcode::has_operand(op) { 2 } else { 1 };
    }

    assert_eq!(run_image(&image).0, ExitCode::Exit(2));
}

#[test]
fn ternary_and_short_circuit_evaluate_lazily() {
    assert_eq!(run("int main(){ return 1 ? 2+3 : 4; }"), ExitCode::Exit(5));

    let source = "int main(){ int i; i=0; 1 || (i=5); 0 && (i=7); return i; }";
    assert_eq!(run(source), ExitCode::Exit(0));

    let source = "int main(){ int i; i=0; 0 || (i=5); return i; }";
    assert_eq!(run(source), ExitCode::Exit(5));
}

#[test]
fn hex_literals_decode_to_their_bit_pattern() {
    assert_eq!(run("int main(){ return 0x1F + 10; }"), ExitCode::Exit(41));

    match run("int main(){ return 0xDeadBeef; }") {
        ExitCode::Exit(code) => assert_eq!(code as u32, 3_735_928_559),
        other => panic!("unexpected stop: {:?}", other),
    }
}

#[test]
fn only_newline_escapes_are_translated() {
    assert_eq!(run("int main(){ return '\\n'; }"), ExitCode::Exit(10));
    // \t keeps the raw 't'
    assert_eq!(run("int main(){ return \"\\t\"[0]; }"), ExitCode::Exit(116));
}

#[test]
fn adjacent_strings_concatenate() {
    let image = build("int main(){ return \"ab\" \"cd\"[3]; }");

    assert_eq!(&image.data()[..4], b"abcd");
    assert_eq!(image.data().len() % 4, 0);
    assert_eq!(run_image(&image).0, ExitCode::Exit(b'd' as Word));
}

#[test]
fn data_head_is_aligned_after_each_string() {
    let image = build("int main(){ printf(\"a\"); printf(\"abc\"); return 0; }");

    assert_eq!(image.data().len(), 8);
    assert_eq!(&image.data()[..2], b"a\0");
    assert_eq!(&image.data()[4..], b"abc\0");
}

#[test]
fn pointer_arithmetic_scales_by_element_size() {
    let source = "int main(){ int* p; p=(int*)malloc(8); p[0]=1; p[1]=2; return p[1]; }";
    assert_eq!(run(source), ExitCode::Exit(2));

    let source = "int main(){ char* c; c=malloc(4); c[0]=65; c[1]=66; return *(c+1); }";
    assert_eq!(run(source), ExitCode::Exit(66));
}

#[test]
fn address_of_writes_through_the_pointer() {
    let source = "int main(){ int i; int* p; i=3; p=&i; *p=8; return i; }";
    assert_eq!(run(source), ExitCode::Exit(8));
}

#[test]
fn increments_step_and_keep_the_old_value() {
    let source = "int main(){ int i; i=5; return i++ + i; }";
    assert_eq!(run(source), ExitCode::Exit(11));

    let source = "int main(){ int i; i=5; --i; return i; }";
    assert_eq!(run(source), ExitCode::Exit(4));

    let source = "int main(){ int* p; p=(int*)malloc(8); p[0]=1; p[1]=9; ++p; return p[0]; }";
    assert_eq!(run(source), ExitCode::Exit(9));
}

#[test]
fn char_stores_truncate() {
    let source = "int main(){ char c; c=300; return c; }";
    assert_eq!(run(source), ExitCode::Exit(44));
}

#[test]
fn division_remainder_and_shifts() {
    assert_eq!(run("int main(){ return 17 % 5 + 17 / 5; }"), ExitCode::Exit(5));
    assert_eq!(run("int main(){ return 1 << 4; }"), ExitCode::Exit(16));
    assert_eq!(run("int main(){ return 0-16 >> 2; }"), ExitCode::Exit(-4));
    assert_eq!(run("int main(){ return !5 + ~0; }"), ExitCode::Exit(-1));
}

#[test]
fn locals_shadow_globals_inside_functions_only() {
    let source = "int x; int f(int x){ return x; } int main(){ x=3; return f(5)+x; }";
    let image = build(source);

    assert_eq!(run_image(&image).0, ExitCode::Exit(8));

    let mut compiler = Compiler::new(source.as_bytes(), false);
    compiler.parse().unwrap();
    let x = compiler.syms.find("x").unwrap();
    assert_eq!(x.class, Class::Glo);
    assert_eq!(x.val, 0);
}

#[test]
fn image_survives_a_serialization_round_trip() {
    let image = build("int g; int main(){ g=1; return g + \"x\"[0]; }");

    let mut bytes = Vec::new();
    bytes.write_image(&image).unwrap();
    let restored = bytes.as_slice().read_image().unwrap();

    assert_eq!(image, restored);
    assert_eq!(run_image(&restored).0, run_image(&image).0);
}

#[test]
fn listing_mode_compiles_the_same_program() {
    assert!(listing("int main(){ return 1 + 2; }\n").is_ok());
}

#[test]
fn first_error_aborts_with_its_line() {
    assert_matches!(
        compile("int main(){ return x; }"),
        Err(CompileError {
            line: 1,
            kind: ErrorKind::UndefinedVariable
        })
    );

    assert_matches!(
        compile("int a; int a;"),
        Err(CompileError {
            kind: ErrorKind::DuplicateGlobal,
            ..
        })
    );

    assert_matches!(
        compile("int f(int x, int x){ return x; }"),
        Err(CompileError {
            kind: ErrorKind::DuplicateParameter,
            ..
        })
    );

    assert_matches!(
        compile("int main(){ int i; int i; return 0; }"),
        Err(CompileError {
            kind: ErrorKind::DuplicateLocal,
            ..
        })
    );

    assert_matches!(
        compile("int main(){\nreturn 0\n}"),
        Err(CompileError {
            line: 3,
            kind: ErrorKind::SemicolonExpected
        })
    );

    assert_matches!(
        compile("int main(){ int i; return i[0]; }"),
        Err(CompileError {
            kind: ErrorKind::PointerExpected,
            ..
        })
    );

    assert_matches!(
        compile("int main(){ return *1; }"),
        Err(CompileError {
            kind: ErrorKind::BadDereference,
            ..
        })
    );

    assert_matches!(
        compile("int a; int main(){ return a(); }"),
        Err(CompileError {
            kind: ErrorKind::BadFunctionCall,
            ..
        })
    );

    assert_matches!(
        compile("int f(){ return 0; }"),
        Err(CompileError {
            line: 0,
            kind: ErrorKind::MainNotDefined
        })
    );
}

#[test]
fn comments_and_hash_lines_are_skipped() {
    let source = "#include <stdio.h>\n// nothing here\nint main(){ return 6; } // done\n";
    assert_eq!(run(source), ExitCode::Exit(6));
}
