#[cfg(feature = "broken")]
compile_error!("the default feature set must be disabled");

use std::process::exit;

fn main() {
  let args: Vec<String> = std::env::args().skip(1).collect();
  let argv: Vec<&str> = args.iter().map(String::as_str).collect();
  match argv.as_slice() {
    ["support", "mangen"] => println!(".TH HELLOTOOL 1"),
    ["support", "completion", "--bash"] => println!("complete -F _hellotool hellotool"),
    ["support", "completion", "--fish"] => println!("complete -c hellotool"),
    ["support", "completion", "--zsh"] => println!("#compdef hellotool"),
    _ => {
      eprintln!("unknown arguments");
      exit(2);
    }
  }
}
