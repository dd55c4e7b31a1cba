mod data_test;
