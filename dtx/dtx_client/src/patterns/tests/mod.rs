pub(crate) mod stub;

mod tcc_tests;
