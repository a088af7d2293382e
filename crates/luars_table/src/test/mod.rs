pub mod test_metamethods;
