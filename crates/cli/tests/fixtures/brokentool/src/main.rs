fn main() {
  this is not rust
}
