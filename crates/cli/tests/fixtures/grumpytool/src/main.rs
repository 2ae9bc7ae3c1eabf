use std::process::exit;

fn main() {
  let args: Vec<String> = std::env::args().skip(1).collect();
  let argv: Vec<&str> = args.iter().map(String::as_str).collect();
  match argv.as_slice() {
    ["support", "mangen"] => {
      eprintln!("mangen is not supported");
      exit(1);
    }
    ["support", "completion", _] => println!("# completion"),
    _ => exit(2),
  }
}
