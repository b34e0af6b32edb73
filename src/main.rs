use relmap::qualify_fragment;
use relmap::sql::Dialect;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <fragment.sql|-> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -a, --alias <alias>     Table alias (default: keep $PlaceHolder$)");
        eprintln!("  -d, --dialect <name>    Dialect: generic, postgresql, mysql, h2, oracle,");
        eprintln!("                          oracle8i, derby, mckoi, sqlserver (default: generic)");
        eprintln!("      --order-by          Treat the fragment as an order by list");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut alias: Option<String> = None;
    let mut dialect = Dialect::Generic;
    let mut order_by = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-a" | "--alias" => {
                i += 1;
                if i < args.len() {
                    alias = Some(args[i].clone());
                }
            }
            "-d" | "--dialect" => {
                i += 1;
                if i < args.len() {
                    dialect = Dialect::from_str(&args[i]).unwrap_or_else(|| {
                        eprintln!("Invalid dialect: {}", args[i]);
                        process::exit(1);
                    });
                }
            }
            "--order-by" => order_by = true,
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input = if input_path == "-" {
        let mut buf = String::new();
        match io::stdin().read_to_string(&mut buf) {
            Ok(_) => buf,
            Err(e) => {
                eprintln!("Failed to read stdin: {}", e);
                process::exit(1);
            }
        }
    } else {
        match fs::read_to_string(input_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to read {}: {}", input_path, e);
                process::exit(1);
            }
        }
    };

    match qualify_fragment(input.trim(), alias.as_deref(), dialect, order_by) {
        Ok(sql) => println!("{}", sql),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
