#[macro_use]
extern crate clap;

use std::fs;
use std::process;

use cifile::Image;
use civm::{ExitCode, Machine};
use clap::Arg;

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to use")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("source")
                .short("s")
                .long("source")
                .help("Prints each source line with its emitted code, then stops"),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("Prints each executed instruction"),
        )
        .arg(
            Arg::with_name("compile")
                .short("c")
                .long("compile")
                .help("Compiles and writes <INPUT>.bin instead of running"),
        )
        .arg(
            Arg::with_name("binary")
                .short("b")
                .long("binary")
                .help("Treats INPUT as a compiled image and runs it"),
        )
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let debug = matches.is_present("debug");

    let code = if matches.is_present("binary") {
        run_binary(input, debug)
    } else if matches.is_present("source") {
        show_listing(input)
    } else if matches.is_present("compile") {
        compile_to_file(input)
    } else {
        match compile_source(input) {
            Ok(image) => execute(&image, input, debug),
            Err(code) => code,
        }
    };

    process::exit(code);
}

fn read_source(input: &str) -> Result<String, i32> {
    fs::read_to_string(input).map_err(|_| {
        println!("could not open({})", input);
        -1
    })
}

fn compile_source(input: &str) -> Result<Image, i32> {
    let source = read_source(input)?;
    cic::compile(&source).map_err(|err| {
        println!("{}", err);
        -1
    })
}

fn show_listing(input: &str) -> i32 {
    let source = match read_source(input) {
        Ok(source) => source,
        Err(code) => return code,
    };
    match cic::listing(&source) {
        Ok(()) => 0,
        Err(err) => {
            println!("{}", err);
            -1
        }
    }
}

fn compile_to_file(input: &str) -> i32 {
    let image = match compile_source(input) {
        Ok(image) => image,
        Err(code) => return code,
    };
    let output = format!("{}.bin", input);
    match cifile::write_file(&output, &image) {
        Ok(()) => 0,
        Err(err) => {
            println!("could not write {}: {}", output, err);
            -1
        }
    }
}

fn run_binary(input: &str, debug: bool) -> i32 {
    let image = match cifile::read_file(input) {
        Ok(image) => image,
        Err(_) => {
            println!("could not open({})", input);
            return -1;
        }
    };
    if image.main_offset() < 1 {
        println!("main() not defined");
        return -1;
    }
    execute(&image, input, debug)
}

fn execute(image: &Image, input: &str, debug: bool) -> i32 {
    let mut machine = Machine::new(image.text(), image.data(), image.main_offset());
    machine.set_trace(debug);

    let args = vec![input.to_string()];
    match machine.run(&args) {
        ExitCode::Exit(code) => code,
        _ => -1,
    }
}
